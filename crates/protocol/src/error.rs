//! Protocol error types
//!
//! Errors that can occur when encoding or decoding stream events.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Event payload is not valid JSON or does not match its declared shape
    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame `event:` field does not name a known event type
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// Frame `event:` field disagrees with the payload's `type` tag
    #[error("event type mismatch: frame says {frame}, payload says {payload}")]
    TypeMismatch { frame: String, payload: String },

    /// Frame carried no data field
    #[error("empty frame data")]
    EmptyData,
}
