//! Configuration types for the relay event stream
//!
//! Both halves of the system are configured here: `BrokerConfig` for the
//! server-side broker, `StreamConfig` for the subscriber-side stream
//! client. All fields have safe defaults and deserialize with
//! `#[serde(default)]`, so an empty config is a valid config.
//!
//! Out-of-range values never survive loading: call `normalize()` after
//! deserializing and any zero duration or zero count falls back to its
//! default. A zero retry delay would otherwise turn reconnection into a
//! busy loop against a dead server.

mod broker;
mod stream;

pub use broker::BrokerConfig;
pub use stream::StreamConfig;
