//! Subscriber sinks
//!
//! An `EventSink` is the broker's view of one open subscriber transport:
//! "write this framed event, tell me if that is no longer possible".
//! Writes must never block - a stuck subscriber is the subscriber's
//! problem, not the broadcast loop's.
//!
//! `ChannelSink` is the shipped implementation: a bounded channel whose
//! receiving half is drained by whatever owns the actual connection (the
//! HTTP layer streaming frames into a response body). A full buffer is a
//! write failure by design - the backpressure policy is to drop the slow
//! subscriber rather than buffer without bound for everyone else.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SinkError;

/// A writable transport currently open to one subscriber
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Write one encoded frame without blocking
    fn write(&self, frame: &str) -> Result<(), SinkError>;
}

/// Bounded-channel sink
///
/// The receiver half belongs to the connection owner; when it is dropped
/// (client went away) or stops draining (client too slow), the next write
/// fails and the broker removes the subscriber.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    /// Create a sink with the given frame buffer, returning the drain side
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn write(&self, frame: &str) -> Result<(), SinkError> {
        self.tx.try_send(frame.to_string()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod tests;
