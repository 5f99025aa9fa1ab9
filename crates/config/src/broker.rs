//! Broker configuration

use serde::Deserialize;
use std::time::Duration;

/// Default heartbeat emission period
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default per-subscriber sink buffer (frames)
const DEFAULT_SINK_BUFFER: usize = 256;

/// Server-side broker configuration
///
/// # Example
///
/// ```toml
/// [broker]
/// heartbeat_interval = "30s"
/// sink_buffer = 256
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Heartbeat emission period
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Per-subscriber sink buffer in frames; a full buffer counts as a
    /// write failure and drops the subscriber
    /// Default: 256
    pub sink_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            sink_buffer: DEFAULT_SINK_BUFFER,
        }
    }
}

impl BrokerConfig {
    /// Replace out-of-range values with their defaults
    pub fn normalize(mut self) -> Self {
        if self.heartbeat_interval.is_zero() {
            self.heartbeat_interval = DEFAULT_HEARTBEAT_INTERVAL;
        }
        if self.sink_buffer == 0 {
            self.sink_buffer = DEFAULT_SINK_BUFFER;
        }
        self
    }
}
