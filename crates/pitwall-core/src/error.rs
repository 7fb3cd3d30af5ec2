//! Error types for per-frame processing.
//!
//! Both variants are contained to the single frame that produced them:
//! callers log and skip, they never unwind a loop.

/// Maximum number of characters of a frame kept in an error for logging.
const PREVIEW_LEN: usize = 160;

/// Errors raised while repairing, decoding or validating one frame.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The frame could not be repaired into parseable JSON.
    #[error("malformed payload: {reason} (frame: {preview})")]
    MalformedPayload {
        /// Why decoding failed.
        reason: String,
        /// A truncated copy of the offending frame.
        preview: String,
    },

    /// The frame decoded but does not have the expected structure.
    #[error("shape validation failed: {0}")]
    ShapeValidation(String),
}

impl CoreError {
    /// Build a [`CoreError::MalformedPayload`] carrying a preview of `frame`.
    pub fn malformed(reason: impl Into<String>, frame: &str) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            preview: preview(frame),
        }
    }
}

/// Truncate a frame to at most [`PREVIEW_LEN`] characters for logging.
pub fn preview(frame: &str) -> String {
    match frame.char_indices().nth(PREVIEW_LEN) {
        Some((end, _)) => format!("{}...", frame.get(..end).unwrap_or(frame)),
        None => frame.to_owned(),
    }
}
