//! The stream client
//!
//! `StreamClient` is the public handle; the real work happens in a single
//! driver task that owns the transport, the heartbeat watchdog and the
//! reconnect timer. The handle talks to the driver over a command channel,
//! so there is exactly one owner of all connection state and no timer can
//! outlive a `disconnect()` - the driver clears everything before
//! acknowledging.
//!
//! State is published through a `watch` channel: every transition is
//! observable, none are silent.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

use relay_config::StreamConfig;
use relay_protocol::{decode_event, EventKind, Frame, ProtocolError};

use crate::error::ClientError;
use crate::handlers::Handlers;
use crate::state::{Action, ConnectionState, Input, Machine};
use crate::transport::{FrameStream, HttpTransport, Transport};

/// Subscriber-side stream client handle
///
/// Cheap to clone; all clones drive the same connection. Dropping the last
/// handle stops the driver task.
#[derive(Debug, Clone)]
pub struct StreamClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    url: String,
    retry_count: AtomicU32,
    is_open: AtomicBool,
}

enum Command {
    Connect,
    Disconnect(oneshot::Sender<()>),
    Register(Handlers),
}

/// Read-only snapshot of the client's session
#[derive(Debug, Clone)]
pub struct ClientStats {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub is_open: bool,
    pub url: String,
}

impl StreamClient {
    /// Create a client over the given transport
    ///
    /// Must be called inside a tokio runtime: the driver is a spawned
    /// task. The client starts disconnected; call `connect()` to open the
    /// stream.
    pub fn new(config: StreamConfig, transport: Arc<dyn Transport>) -> Self {
        let config = config.normalize();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            url: config.url.clone(),
            retry_count: AtomicU32::new(0),
            is_open: AtomicBool::new(false),
        });

        let driver = Driver {
            machine: Machine::new(&config),
            heartbeat_timeout: config.heartbeat_timeout,
            transport,
            handlers: Handlers::new(),
            stream: None,
            watchdog_deadline: tokio::time::Instant::now(),
            backoff_deadline: tokio::time::Instant::now(),
            state_tx,
            shared: Arc::clone(&shared),
            cmd_rx,
        };
        tokio::spawn(driver.run());

        Self {
            cmd_tx,
            state_rx,
            shared,
        }
    }

    /// Create a client over the shipped HTTP transport
    pub fn with_http_transport(config: StreamConfig) -> Self {
        Self::new(config, Arc::new(HttpTransport::new()))
    }

    /// Open the stream
    ///
    /// No-op while an attempt or connection is already in flight; also the
    /// manual restart out of the terminal error state.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Close the stream and cancel every pending timer
    ///
    /// Safe to call from any state. When this returns, the driver has
    /// acknowledged: no further handler invocation or state transition
    /// happens until a new `connect()`.
    pub async fn disconnect(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Disconnect(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Merge per-type handlers into the client
    ///
    /// Later registrations for the same event type override earlier ones.
    /// Callable in any state; the transport need not be open.
    pub fn on(&self, handlers: Handlers) {
        let _ = self.cmd_tx.send(Command::Register(handlers));
    }

    /// Subscribe to connection-state changes
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Read-only session snapshot; no side effects
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            state: *self.state_rx.borrow(),
            retry_count: self.shared.retry_count.load(Ordering::Relaxed),
            is_open: self.shared.is_open.load(Ordering::Relaxed),
            url: self.shared.url.clone(),
        }
    }
}

/// The driver task: sole owner of the transport, timers, and handlers
struct Driver {
    machine: Machine,
    heartbeat_timeout: Duration,
    transport: Arc<dyn Transport>,
    handlers: Handlers,
    stream: Option<FrameStream>,
    watchdog_deadline: tokio::time::Instant,
    backoff_deadline: tokio::time::Instant,
    state_tx: watch::Sender<ConnectionState>,
    shared: Arc<Shared>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let keep_running = match self.machine.state() {
                ConnectionState::Disconnected | ConnectionState::Error => self.idle().await,
                ConnectionState::Connecting => self.connecting().await,
                ConnectionState::Connected => self.connected().await,
                ConnectionState::Reconnecting => self.reconnecting().await,
            };
            if !keep_running {
                break;
            }
        }
        debug!("stream client driver stopped");
    }

    /// Disconnected or terminal error: nothing to do until a command
    async fn idle(&mut self) -> bool {
        let cmd = self.cmd_rx.recv().await;
        self.command_or_stop(cmd)
    }

    /// One open attempt in flight
    ///
    /// Commands are serviced while the open is pending, but only a state
    /// change (disconnect) abandons the attempt - a redundant `connect()`
    /// or a handler registration must not restart it.
    async fn connecting(&mut self) -> bool {
        let transport = Arc::clone(&self.transport);
        let url = self.shared.url.clone();
        let mut open = transport.open(&url);

        loop {
            tokio::select! {
                result = &mut open => {
                    match result {
                        Ok(stream) => {
                            debug!(url = %url, "transport opened");
                            self.stream = Some(stream);
                            self.step(Input::TransportOpened);
                        }
                        Err(e) => {
                            debug!(url = %url, error = %e, "transport open failed");
                            self.step(Input::TransportFailed);
                        }
                    }
                    return true;
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            self.handle_command(cmd);
                            if self.machine.state() != ConnectionState::Connecting {
                                // Disconnected mid-attempt; drop the open
                                return true;
                            }
                        }
                        None => return false,
                    }
                }
            }
        }
    }

    /// Streaming: frames, the watchdog, and commands race
    async fn connected(&mut self) -> bool {
        let deadline = self.watchdog_deadline;

        tokio::select! {
            item = next_frame(&mut self.stream) => {
                match item {
                    Some(Ok(frame)) => self.handle_frame(frame),
                    Some(Err(e)) => {
                        warn!(error = %e, "stream error");
                        self.step(Input::TransportClosed);
                    }
                    None => {
                        debug!("stream closed by server");
                        self.step(Input::TransportClosed);
                    }
                }
                true
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("heartbeat watchdog elapsed, treating connection as lost");
                self.step(Input::WatchdogElapsed);
                true
            }
            cmd = self.cmd_rx.recv() => self.command_or_stop(cmd),
        }
    }

    /// Waiting out the backoff delay
    async fn reconnecting(&mut self) -> bool {
        let deadline = self.backoff_deadline;

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                self.step(Input::BackoffElapsed);
                true
            }
            cmd = self.cmd_rx.recv() => self.command_or_stop(cmd),
        }
    }

    fn command_or_stop(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            Some(cmd) => {
                self.handle_command(cmd);
                true
            }
            // All handles dropped
            None => false,
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.step(Input::ConnectRequested),
            Command::Disconnect(ack) => {
                self.step(Input::DisconnectRequested);
                // Timers and stream are gone; only now does disconnect() return
                let _ = ack.send(());
            }
            Command::Register(handlers) => self.handlers.merge(handlers),
        }
    }

    /// Decode and dispatch one frame
    ///
    /// A malformed payload is logged and dropped - one bad frame never
    /// tears down the connection. Heartbeats additionally rearm the
    /// watchdog. Frames with an unrecognized type go to the raw fallback.
    fn handle_frame(&mut self, frame: Frame) {
        match decode_event(&frame) {
            Ok(event) => {
                if event.kind() == EventKind::Heartbeat {
                    trace!("heartbeat received");
                    self.step(Input::HeartbeatReceived);
                }
                self.handlers.dispatch_event(&event);
            }
            Err(ProtocolError::UnknownEventType(event_type)) => {
                trace!(event_type, "unrecognized event type");
                self.handlers.dispatch_raw(&frame);
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    /// Feed one input through the machine and perform its actions
    fn step(&mut self, input: Input) {
        for action in self.machine.apply(input) {
            match action {
                // The connecting state drives the actual open
                Action::OpenTransport => {}
                Action::ArmWatchdog => {
                    self.watchdog_deadline = tokio::time::Instant::now() + self.heartbeat_timeout;
                }
                Action::ScheduleReconnect(delay) => {
                    self.stream = None;
                    self.backoff_deadline = tokio::time::Instant::now() + delay;
                    debug!(
                        delay_ms = delay.as_millis() as u64,
                        retry = self.machine.retry_count(),
                        "reconnect scheduled"
                    );
                }
                Action::ClearTimers => {
                    self.stream = None;
                }
            }
        }
        self.publish();
    }

    /// Publish the machine's state to observers
    fn publish(&self) {
        let state = self.machine.state();
        self.shared
            .retry_count
            .store(self.machine.retry_count(), Ordering::Relaxed);
        self.shared
            .is_open
            .store(state == ConnectionState::Connected, Ordering::Relaxed);
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }
}

/// Next frame off the stream; pends forever when no stream is open
///
/// The pending arm never wins a `select!` in practice - the driver only
/// polls frames in the connected state, which implies an open stream.
async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<Frame, ClientError>> {
    match stream {
        Some(stream) => futures_util::StreamExt::next(stream).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
