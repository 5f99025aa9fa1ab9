//! Relay Protocol - event model and wire framing for the relay stream
//!
//! This crate provides the types that flow between the broker and its
//! subscribers:
//! - `Event` - tagged event envelope (id, timestamp, source, payload)
//! - `EventPayload` - `Log`, `ScrapingProgress`, `System`, `Heartbeat`
//! - `Frame` / `FrameDecoder` - SSE text framing, encode and incremental decode
//!
//! # Wire Format
//!
//! One event per frame, terminated by a blank line:
//!
//! ```text
//! event: <type>\n
//! data: <json-encoded event>\n
//! id: <event id>\n
//! \n
//! ```
//!
//! The `data` field carries the full event as JSON with a `type`
//! discriminant, so a frame is self-describing even without the `event:`
//! line. The decoder is incremental: feed it raw chunks as they arrive off
//! the transport and drain complete frames as they become available.

mod error;
mod event;
mod frame;

pub use error::ProtocolError;
pub use event::{
    Event, EventKind, EventPayload, LogLevel, MemorySnapshot, ScrapeStatus, Source,
    SystemEventKind,
};
pub use frame::{decode_event, encode_event, Frame, FrameDecoder};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

// Test modules - only compiled during testing
#[cfg(test)]
mod event_test;
