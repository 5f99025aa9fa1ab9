//! Stream client configuration

use serde::Deserialize;
use std::time::Duration;

/// Default stream endpoint
const DEFAULT_URL: &str = "http://127.0.0.1:8080/events/stream";

/// Default base delay between reconnect attempts
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default number of reconnect attempts before settling into error
const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default heartbeat watchdog timeout
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default backoff cap factor (delay grows linearly up to this multiple)
const DEFAULT_BACKOFF_CAP: u32 = 5;

/// Subscriber-side stream client configuration
///
/// # Example
///
/// ```toml
/// [stream]
/// url = "http://127.0.0.1:8080/events/stream"
/// retry_delay = "1s"
/// max_retries = 10
/// heartbeat_timeout = "60s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Stream endpoint URL
    pub url: String,

    /// Base delay between reconnect attempts; the effective delay is
    /// `retry_delay * min(retry_count, backoff_cap)`
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Reconnect attempts before the client settles into the terminal
    /// error state
    /// Default: 10
    pub max_retries: u32,

    /// Silence window after which the connection is considered lost even
    /// if the transport still looks open
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,

    /// Backoff cap factor
    /// Default: 5
    pub backoff_cap: u32,

    /// Whether to reconnect automatically on connection loss
    /// Default: true
    pub auto_reconnect: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            auto_reconnect: true,
        }
    }
}

impl StreamConfig {
    /// Create a config for the given endpoint, defaults elsewhere
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Replace out-of-range values with their defaults
    ///
    /// A zero retry delay or heartbeat timeout would produce a zero-delay
    /// retry storm; zero retries or cap would disable reconnection
    /// semantics entirely. None of them survive normalization.
    pub fn normalize(mut self) -> Self {
        if self.retry_delay.is_zero() {
            self.retry_delay = DEFAULT_RETRY_DELAY;
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.heartbeat_timeout.is_zero() {
            self.heartbeat_timeout = DEFAULT_HEARTBEAT_TIMEOUT;
        }
        if self.backoff_cap == 0 {
            self.backoff_cap = DEFAULT_BACKOFF_CAP;
        }
        self
    }
}
