//! Error types for the upstream connector and ingest pipeline.

use std::time::Duration;

use pitwall_core::CoreError;
use tokio_tungstenite::tungstenite;

/// Errors raised by the feed connector and pipeline.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Socket connect, upgrade, read or write failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The negotiation call failed or returned an unusable response.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// A single frame could not be decoded or validated.
    #[error(transparent)]
    Frame(#[from] CoreError),

    /// No meaningful upstream data arrived within the threshold.
    #[error("no meaningful upstream data for {0:?}")]
    InactivityTimeout(Duration),

    /// The pipeline side of the internal queue is gone.
    #[error("internal queue closed")]
    QueueClosed,
}

impl FeedError {
    /// Whether the connector should back off and reconnect.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Negotiation(_))
    }
}

impl From<tungstenite::Error> for FeedError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        Self::Negotiation(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FeedError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::QueueClosed
    }
}
