//! Connection state machine
//!
//! The client's lifecycle is an explicit finite-state machine driven by
//! discrete inputs - transport opened, transport failed, heartbeat
//! received, timer fired, disconnect called - with no knowledge of timers,
//! sockets, or tasks. `Machine::apply` consumes one input and returns the
//! actions the driver must perform. That keeps every transition unit
//! testable without a runtime.
//!
//! # Transitions
//!
//! | From          | Input               | To                          |
//! |---------------|---------------------|-----------------------------|
//! | disconnected  | connect requested   | connecting                  |
//! | connecting    | transport opened    | connected                   |
//! | connecting    | transport failed    | reconnecting (or error)     |
//! | connected     | heartbeat received  | connected (watchdog rearmed)|
//! | connected     | watchdog elapsed    | reconnecting (or error)     |
//! | connected     | transport closed    | reconnecting / disconnected |
//! | reconnecting  | backoff elapsed     | connecting                  |
//! | any           | disconnect requested| disconnected                |
//!
//! A reconnect is only scheduled while `retry_count < max_retries`; at the
//! limit the machine settles into the terminal `error` state until a
//! manual connect. `retry_count` resets to 0 on every transition into
//! `connected` and increments exactly when a reconnect is scheduled.

use std::time::Duration;

use relay_config::StreamConfig;

use crate::backoff;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal until a manual `connect()`: retries exhausted, or a
    /// connection failed with auto-reconnect disabled
    Error,
}

impl ConnectionState {
    /// Get string representation
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discrete inputs driving the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// `connect()` was called
    ConnectRequested,
    /// The transport opened successfully
    TransportOpened,
    /// The transport failed to open
    TransportFailed,
    /// The open transport closed or errored
    TransportClosed,
    /// A heartbeat event arrived
    HeartbeatReceived,
    /// The heartbeat watchdog fired (silence too long)
    WatchdogElapsed,
    /// The reconnect backoff delay elapsed
    BackoffElapsed,
    /// `disconnect()` was called
    DisconnectRequested,
}

/// Side effects the driver must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start opening the transport
    OpenTransport,
    /// (Re)arm the heartbeat watchdog for one timeout window
    ArmWatchdog,
    /// Drop the transport and wait out the given backoff delay
    ScheduleReconnect(Duration),
    /// Drop the transport and cancel all pending timers
    ClearTimers,
}

/// The connection state machine
#[derive(Debug)]
pub struct Machine {
    state: ConnectionState,
    retry_count: u32,
    retry_delay: Duration,
    max_retries: u32,
    backoff_cap: u32,
    auto_reconnect: bool,
}

impl Machine {
    /// Create a machine in `disconnected` with the given policy
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            retry_delay: config.retry_delay,
            max_retries: config.max_retries,
            backoff_cap: config.backoff_cap,
            auto_reconnect: config.auto_reconnect,
        }
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts scheduled since the last successful connection
    #[inline]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Apply one input, returning the actions to perform
    ///
    /// Inputs that make no sense in the current state (a stale timer, a
    /// late transport event) are ignored and return no actions.
    pub fn apply(&mut self, input: Input) -> Vec<Action> {
        use ConnectionState::*;

        match (self.state, input) {
            // Manual connect from an idle state
            (Disconnected | Error, Input::ConnectRequested) => {
                self.state = Connecting;
                vec![Action::OpenTransport]
            }
            // Idempotent while an attempt or connection is in flight
            (Connecting | Connected | Reconnecting, Input::ConnectRequested) => vec![],

            (Connecting, Input::TransportOpened) => {
                self.state = Connected;
                self.retry_count = 0;
                vec![Action::ArmWatchdog]
            }
            (Connecting, Input::TransportFailed) => self.lose_connection(false),

            (Connected, Input::HeartbeatReceived) => vec![Action::ArmWatchdog],
            // Silence is connection loss, even if the transport looks open
            (Connected, Input::WatchdogElapsed) => self.lose_connection(false),
            (Connected, Input::TransportClosed) => self.lose_connection(true),

            (Reconnecting, Input::BackoffElapsed) => {
                self.state = Connecting;
                vec![Action::OpenTransport]
            }

            (_, Input::DisconnectRequested) => {
                self.state = Disconnected;
                self.retry_count = 0;
                vec![Action::ClearTimers]
            }

            // Stale or irrelevant input for this state
            _ => vec![],
        }
    }

    /// Shared path for every flavor of connection loss
    ///
    /// Schedules a reconnect while the budget lasts; settles into the
    /// terminal `error` state once `retry_count` reaches `max_retries`.
    /// With auto-reconnect disabled a clean close parks in `disconnected`
    /// and a failure surfaces as `error`.
    fn lose_connection(&mut self, clean_close: bool) -> Vec<Action> {
        if !self.auto_reconnect {
            self.state = if clean_close {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Error
            };
            return vec![Action::ClearTimers];
        }

        if self.retry_count >= self.max_retries {
            self.state = ConnectionState::Error;
            return vec![Action::ClearTimers];
        }

        self.retry_count += 1;
        self.state = ConnectionState::Reconnecting;
        let delay = backoff::delay(self.retry_delay, self.retry_count, self.backoff_cap);
        vec![Action::ScheduleReconnect(delay)]
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
