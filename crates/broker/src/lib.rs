//! Relay Broker - server-side event distribution
//!
//! This crate owns the set of live subscriber connections and broadcasts
//! framed events to them:
//!
//! - `EventSink` - seam to one open subscriber transport; the shipped
//!   `ChannelSink` wraps a bounded channel and never blocks
//! - `Subscriber` / `SubscriberRegistry` - the live-connection registry
//! - `EventBroker` - the facade producers talk to: `emit_*` constructors,
//!   `broadcast`, subscriber lifecycle, and the heartbeat ticker
//!
//! # Architecture
//!
//! ```text
//! Producers (scraper, logger, handlers)
//!     │  emit_log / emit_scraping_progress / emit_system
//!     ▼
//! EventBroker ──── heartbeat ticker (interval task)
//!     │  encode once
//!     ▼
//! SubscriberRegistry ──→ Sink A (bounded, non-blocking)
//!                   ├──→ Sink B
//!                   └──→ Sink C   ◄── failed write = subscriber removed
//! ```
//!
//! A slow or dead subscriber never stalls the rest: sinks are written with
//! a non-blocking send and any failure (full buffer, closed transport)
//! removes that subscriber on the spot. The registry holds an entry if and
//! only if its sink is believed writable.

mod broker;
mod error;
mod sink;
mod snapshot;
mod subscriber;

pub use broker::{BrokerStats, EventBroker};
pub use error::SinkError;
pub use sink::{ChannelSink, EventSink};
pub use snapshot::memory_snapshot;
pub use subscriber::{Subscriber, SubscriberRegistry};

// Re-export the config type consumed by `EventBroker::new`
pub use relay_config::BrokerConfig;
