//! Error types for the broker crate

use thiserror::Error;

/// Why a write to a subscriber sink failed
///
/// Every variant means the same thing to the broker: the subscriber is no
/// longer worth writing to and gets removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The sink's buffer is full (subscriber too slow to drain it)
    #[error("sink buffer full")]
    Full,

    /// The transport behind the sink is gone
    #[error("sink closed")]
    Closed,
}
