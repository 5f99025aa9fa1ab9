//! Reconnect backoff
//!
//! Capped-linear: the delay grows with the retry count up to a fixed
//! multiple of the base delay, then stays flat. Deliberately not
//! exponential - the reconnection cadence stays predictable and bounded.

use std::time::Duration;

/// Delay before reconnect attempt number `retry_count` (1-based)
///
/// `base * min(retry_count, cap)`, never less than one base delay.
pub fn delay(base: Duration, retry_count: u32, cap: u32) -> Duration {
    base * retry_count.clamp(1, cap.max(1))
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
