//! Error types for the relay binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during relay startup and shutdown.

use pitwall_core::StopReason;

/// Top-level error for the relay binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: pitwall_core::ConfigError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },

    /// The stream server failed to start.
    #[error("stream server error: {source}")]
    Stream {
        /// The underlying startup error.
        #[from]
        source: pitwall_stream::startup::StartupError,
    },

    /// The stream server task did not finish cleanly.
    #[error("stream server task failed: {message}")]
    StreamTask {
        /// Description of the join failure.
        message: String,
    },

    /// The feed stopped because of an unrecoverable failure.
    #[error("feed stopped: {}", reason.as_str())]
    Feed {
        /// Why the feed stopped.
        reason: StopReason,
    },
}
