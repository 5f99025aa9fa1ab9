//! Relay Client - the subscriber side of the event stream
//!
//! Runs inside each subscriber process. `StreamClient` opens the transport,
//! tracks connection state through an explicit state machine, watches for
//! heartbeat silence, and reconnects with bounded capped-linear backoff.
//! Decoded events are dispatched to per-type handlers.
//!
//! # Architecture
//!
//! ```text
//! StreamClient (handle)          Driver task (single owner)
//!   connect() ────────┐            ┌─────────────────────────┐
//!   disconnect() ─────┼─ commands ─►  Machine (pure FSM)     │
//!   on(handlers) ─────┘            │  transport + stream     │
//!   state_changes() ◄── watch ─────│  watchdog + backoff     │
//!   stats()                        └─────────────────────────┘
//! ```
//!
//! The state machine itself (`state` module) is pure: discrete inputs in,
//! actions out, no timers or sockets. The driver task owns the transport
//! and both timers, so cancellation on `disconnect()` is total - once the
//! driver acknowledges, nothing fires into the torn-down session.

mod backoff;
mod client;
mod error;
mod handlers;
mod state;
mod transport;

pub use client::{ClientStats, StreamClient};
pub use error::ClientError;
pub use handlers::Handlers;
pub use state::{Action, ConnectionState, Input, Machine};
pub use transport::{FrameStream, HttpTransport, Transport};

// Re-export the config type consumed by `StreamClient::new`
pub use relay_config::StreamConfig;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
