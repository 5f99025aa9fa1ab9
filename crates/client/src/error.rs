//! Error types for the client crate

use thiserror::Error;

/// Errors that can occur in the stream client
///
/// All of these are transport-level: local, recoverable, and surfaced as
/// state transitions rather than unhandled failures. The only terminal
/// condition - retries exhausted - is a state (`ConnectionState::Error`),
/// not an error value.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not be opened or broke mid-stream
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP-level failure from the shipped transport
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
