//! Tests for the stream client
//!
//! These run on a paused clock: timers fire deterministically as virtual
//! time advances, so watchdog and backoff behavior is exact.

use super::*;

use std::collections::VecDeque;
use std::sync::atomic::AtomicU32;

use parking_lot::Mutex;

use relay_protocol::{Event, EventPayload, LogLevel, MemorySnapshot, Source};

// =============================================================================
// Scripted transport
// =============================================================================

type FrameSender = mpsc::UnboundedSender<crate::Result<Frame>>;

enum Attempt {
    Fail,
    Open(mpsc::UnboundedReceiver<crate::Result<Frame>>),
}

/// Transport whose connection attempts are scripted by the test
///
/// Unscripted attempts fail, so a bare `MockTransport::new()` behaves like
/// a server that refuses every connection.
struct MockTransport {
    attempts: Mutex<VecDeque<Attempt>>,
    opens: AtomicU32,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(VecDeque::new()),
            opens: AtomicU32::new(0),
        })
    }

    /// Script one failed connection attempt
    fn push_failure(&self) {
        self.attempts.lock().push_back(Attempt::Fail);
    }

    /// Script one successful attempt; the returned sender feeds its frames
    fn push_open(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.attempts.lock().push_back(Attempt::Open(rx));
        tx
    }

    fn opens(&self) -> u32 {
        self.opens.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn open(&self, _url: &str) -> crate::Result<FrameStream> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        match self.attempts.lock().pop_front() {
            Some(Attempt::Open(rx)) => {
                let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(Box::pin(stream) as FrameStream)
            }
            Some(Attempt::Fail) | None => {
                Err(ClientError::Transport("connection refused".into()))
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn make_config() -> StreamConfig {
    StreamConfig {
        url: "mock://stream".into(),
        retry_delay: Duration::from_secs(1),
        max_retries: 3,
        heartbeat_timeout: Duration::from_secs(60),
        backoff_cap: 5,
        auto_reconnect: true,
    }
}

fn event_frame(payload: EventPayload) -> Frame {
    let event = Event::new("test-1", Source::Backend, payload);
    Frame {
        event: event.kind().as_str().to_string(),
        data: serde_json::to_string(&event).unwrap(),
        id: Some(event.id.clone()),
    }
}

fn log_frame(message: &str) -> Frame {
    event_frame(EventPayload::Log {
        level: LogLevel::Info,
        message: message.to_string(),
    })
}

fn heartbeat_frame() -> Frame {
    event_frame(EventPayload::Heartbeat {
        uptime_ms: 1000,
        memory: MemorySnapshot {
            rss_bytes: 1,
            virtual_bytes: 1,
        },
        active_connections: 1,
    })
}

/// Block until the observed state matches, bounded by a (virtual) hour
async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            if *rx.borrow() == want {
                return;
            }
            rx.changed().await.expect("driver dropped the state channel");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {want}"));
}

/// Poll until the captured value count reaches `n`
async fn wait_for_count(counter: &Mutex<Vec<String>>, n: usize) {
    for _ in 0..200 {
        if counter.lock().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {n} captured values");
}

// =============================================================================
// Connect / idempotence
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_reaches_connected() {
    let transport = MockTransport::new();
    let _tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    let stats = client.stats();
    assert_eq!(stats.state, ConnectionState::Connected);
    assert!(stats.is_open);
    assert_eq!(stats.retry_count, 0);
    assert_eq!(stats.url, "mock://stream");
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_idempotent_while_open() {
    let transport = MockTransport::new();
    let _tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    client.connect();
    tokio::time::sleep(Duration::from_secs(5)).await;

    // One transport open total, despite three connect() calls
    assert_eq!(transport.opens(), 1);
    assert_eq!(client.stats().state, ConnectionState::Connected);
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_log_event_dispatched_to_handler() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&received);
    client.on(Handlers::new().on_event(EventKind::Log, move |event| {
        if let EventPayload::Log { message, .. } = &event.payload {
            captured.lock().push(message.clone());
        }
    }));

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    tx.send(Ok(log_frame("hello"))).unwrap();
    wait_for_count(&received, 1).await;

    assert_eq!(received.lock().as_slice(), ["hello".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped_stream_stays_up() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&received);
    client.on(Handlers::new().on_event(EventKind::Log, move |event| {
        if let EventPayload::Log { message, .. } = &event.payload {
            captured.lock().push(message.clone());
        }
    }));

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    // Malformed payload first, then a good frame
    tx.send(Ok(Frame {
        event: "log".to_string(),
        data: "{not json".to_string(),
        id: None,
    }))
    .unwrap();
    tx.send(Ok(log_frame("good"))).unwrap();
    wait_for_count(&received, 1).await;

    assert_eq!(received.lock().as_slice(), ["good".to_string()]);
    assert_eq!(client.stats().state, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_type_goes_to_raw_fallback() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    let typed = Arc::new(Mutex::new(Vec::new()));
    let raw = Arc::new(Mutex::new(Vec::new()));
    let typed_captured = Arc::clone(&typed);
    let raw_captured = Arc::clone(&raw);
    client.on(
        Handlers::new()
            .on_event(EventKind::Log, move |event| {
                typed_captured.lock().push(event.id.clone());
            })
            .on_raw_frame(move |frame| {
                raw_captured.lock().push(frame.event.clone());
            }),
    );

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    tx.send(Ok(Frame {
        event: "message".to_string(),
        data: "{}".to_string(),
        id: None,
    }))
    .unwrap();
    wait_for_count(&raw, 1).await;

    assert_eq!(raw.lock().as_slice(), ["message".to_string()]);
    assert!(typed.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_later_handler_registration_wins() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&received);
    let second = Arc::clone(&received);
    client.on(Handlers::new().on_event(EventKind::Log, move |_| {
        first.lock().push("first".to_string());
    }));
    client.on(Handlers::new().on_event(EventKind::Log, move |_| {
        second.lock().push("second".to_string());
    }));

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    tx.send(Ok(log_frame("x"))).unwrap();
    wait_for_count(&received, 1).await;

    assert_eq!(received.lock().as_slice(), ["second".to_string()]);
}

// =============================================================================
// Heartbeat watchdog
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_rearms_watchdog() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    // t=50: inside the first watchdog window
    tokio::time::sleep(Duration::from_secs(50)).await;
    assert_eq!(client.stats().state, ConnectionState::Connected);

    tx.send(Ok(heartbeat_frame())).unwrap();

    // t=105: past the original deadline (60) but inside the rearmed one (~110)
    tokio::time::sleep(Duration::from_secs(55)).await;
    assert_eq!(client.stats().state, ConnectionState::Connected);

    // t=115: the rearmed deadline has now elapsed without another heartbeat
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_ne!(client.stats().state, ConnectionState::Connected);
    assert!(client.stats().retry_count >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_silence_forces_reconnect() {
    let transport = MockTransport::new();
    let _tx1 = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    // Second attempt ready for the reconnect after the watchdog fires
    let _tx2 = transport.push_open();

    // Watchdog at 60s, backoff 1s: comfortably reconnected by 63s
    tokio::time::sleep(Duration::from_secs(63)).await;

    assert_eq!(client.stats().state, ConnectionState::Connected);
    assert_eq!(client.stats().retry_count, 0);
    assert_eq!(transport.opens(), 2);
}

// =============================================================================
// Reconnect / retry exhaustion
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transport_close_triggers_reconnect() {
    let transport = MockTransport::new();
    let tx1 = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    let _tx2 = transport.push_open();
    drop(tx1); // server closes the stream

    wait_for_state(&mut state_rx, ConnectionState::Reconnecting).await;
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_settles_in_error() {
    let transport = MockTransport::new(); // refuses everything
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Error).await;

    // Initial attempt plus max_retries reconnects, then nothing
    assert_eq!(transport.opens(), 4);
    assert_eq!(client.stats().retry_count, 3);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.opens(), 4);
    assert_eq!(client.stats().state, ConnectionState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_manual_connect_recovers_from_error() {
    let transport = MockTransport::new();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Error).await;

    let _tx = transport.push_open();
    client.connect();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    assert_eq!(client.stats().retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_auto_reconnect_disabled_parks_disconnected() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let config = StreamConfig {
        auto_reconnect: false,
        ..make_config()
    };
    let client = StreamClient::new(config, transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    drop(tx);
    wait_for_state(&mut state_rx, ConnectionState::Disconnected).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.opens(), 1);
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_reconnect_cancels_pending_timer() {
    let transport = MockTransport::new();
    transport.push_failure();
    let client = StreamClient::new(make_config(), transport.clone());

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Reconnecting).await;
    let opens_before = transport.opens();

    client.disconnect().await;

    let stats = client.stats();
    assert_eq!(stats.state, ConnectionState::Disconnected);
    assert_eq!(stats.retry_count, 0);

    // The armed backoff timer elapses; nothing may happen
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.opens(), opens_before);
    assert_eq!(client.stats().state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_safe_from_disconnected() {
    let transport = MockTransport::new();
    let client = StreamClient::new(make_config(), transport.clone());

    client.disconnect().await;
    assert_eq!(client.stats().state, ConnectionState::Disconnected);

    // And the client still works afterwards
    let _tx = transport.push_open();
    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn test_no_dispatch_after_disconnect() {
    let transport = MockTransport::new();
    let tx = transport.push_open();
    let client = StreamClient::new(make_config(), transport.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&received);
    client.on(Handlers::new().on_event(EventKind::Log, move |event| {
        if let EventPayload::Log { message, .. } = &event.payload {
            captured.lock().push(message.clone());
        }
    }));

    client.connect();
    let mut state_rx = client.state_changes();
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    client.disconnect().await;

    // Frames sent after the acknowledged disconnect go nowhere
    let _ = tx.send(Ok(log_frame("too late")));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(received.lock().is_empty());
    assert_eq!(client.stats().state, ConnectionState::Disconnected);
}
