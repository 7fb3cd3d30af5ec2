//! Upstream connector lifecycle states.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// State of the upstream feed connection.
///
/// The connector walks `Disconnected -> Connecting -> Subscribing ->
/// Streaming`, passing through `Closing` on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum FeedState {
    /// No socket is open.
    Disconnected,
    /// Negotiating and opening the socket.
    Connecting,
    /// Socket open, topic subscription sent.
    Subscribing,
    /// Receiving frames.
    Streaming,
    /// Shutting down the socket.
    Closing,
}

impl FeedState {
    /// Lowercase name used in logs and status payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
        }
    }
}

impl core::fmt::Display for FeedState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_matches_display() {
        for state in [
            FeedState::Disconnected,
            FeedState::Connecting,
            FeedState::Subscribing,
            FeedState::Streaming,
            FeedState::Closing,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, serde_json::Value::String(state.to_string()));
            assert_eq!(serde_json::from_value::<FeedState>(json).unwrap(), state);
        }
    }
}
