//! The event broker
//!
//! `EventBroker` is the single process-scoped owner of the subscriber
//! registry. Producers call the `emit_*` constructors synchronously from
//! wherever events happen (request handlers, the scraper loop); the broker
//! stamps id, timestamp and source, encodes the frame once, and fans it
//! out to every registered sink.
//!
//! Lifecycle: construct with `new()` at the composition root (inside a
//! tokio runtime - construction starts the heartbeat ticker), call
//! `cleanup()` once at teardown. No global instance exists.
//!
//! Failure model: a failed sink write is expected, local, and recoverable.
//! The subscriber is removed on the spot and the broadcast continues with
//! the rest. Nothing in here returns an error to producers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use relay_config::BrokerConfig;
use relay_protocol::{
    encode_event, Event, EventPayload, LogLevel, ScrapeStatus, Source, SystemEventKind,
};

use crate::sink::EventSink;
use crate::snapshot::memory_snapshot;
use crate::subscriber::SubscriberRegistry;

/// Server-side event broker
///
/// Cheap to clone; all clones share one registry and one heartbeat ticker.
#[derive(Debug, Clone)]
pub struct EventBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Debug)]
struct BrokerInner {
    registry: SubscriberRegistry,
    started_at: Instant,
    next_seq: AtomicU64,
    events_broadcast: AtomicU64,
    write_failures: AtomicU64,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl EventBroker {
    /// Create a broker and start its heartbeat ticker
    ///
    /// Must be called inside a tokio runtime: the ticker is a spawned
    /// task. The first heartbeat fires one full period after construction.
    pub fn new(config: BrokerConfig) -> Self {
        let config = config.normalize();

        let broker = Self {
            inner: Arc::new(BrokerInner {
                registry: SubscriberRegistry::new(),
                started_at: Instant::now(),
                next_seq: AtomicU64::new(1),
                events_broadcast: AtomicU64::new(0),
                write_failures: AtomicU64::new(0),
                heartbeat: Mutex::new(None),
            }),
        };

        let handle = spawn_heartbeat(Arc::clone(&broker.inner), config.heartbeat_interval);
        *broker.inner.heartbeat.lock() = Some(handle);

        broker
    }

    /// Register `sink` under `id`, replacing any prior sink for that id
    ///
    /// The new sink alone receives one `system/connection_count` event
    /// carrying the current subscriber count - the connection snapshot a
    /// late joiner gets instead of replay. Re-subscribing under an
    /// existing id is not an error; the last registration wins.
    pub fn add_subscriber(&self, id: &str, sink: Arc<dyn EventSink>) {
        let (subscriber, count) = self.inner.registry.insert(id, sink);
        debug!(id, count, "subscriber registered");

        let greeting = self.inner.connection_count_event(count);
        match encode_event(&greeting) {
            Ok(frame) => {
                if let Err(e) = subscriber.write(&frame) {
                    warn!(id, error = %e, "greeting write failed, removing subscriber");
                    self.inner.write_failures.fetch_add(1, Ordering::Relaxed);
                    self.inner.remove_subscriber(id);
                }
            }
            Err(e) => error!(error = %e, "failed to encode connection_count event"),
        }
    }

    /// Remove the subscriber registered under `id`
    ///
    /// Idempotent - removing an unknown id is a no-op. On actual removal,
    /// the remaining subscribers receive an updated
    /// `system/connection_count` event.
    pub fn remove_subscriber(&self, id: &str) {
        self.inner.remove_subscriber(id);
    }

    /// Broadcast an event to every registered subscriber
    ///
    /// The frame is encoded once and written to each sink in registration
    /// order. A failed write removes that subscriber and only that
    /// subscriber; errors never propagate to the caller.
    pub fn broadcast(&self, event: &Event) {
        self.inner.broadcast(event);
    }

    /// Emit a log event
    pub fn emit_log(&self, level: LogLevel, message: impl Into<String>) {
        let event = self.inner.build_event(
            Source::Backend,
            EventPayload::Log {
                level,
                message: message.into(),
            },
        );
        self.inner.broadcast(&event);
    }

    /// Emit a scraping progress event
    ///
    /// `progress` is clamped to 0..=100.
    pub fn emit_scraping_progress(
        &self,
        progress: u8,
        proxies_found: u32,
        current_source: impl Into<String>,
        status: ScrapeStatus,
        error: Option<String>,
    ) {
        let event = self.inner.build_event(
            Source::Scraping,
            EventPayload::ScrapingProgress {
                progress: progress.min(100),
                proxies_found,
                current_source: current_source.into(),
                status,
                error,
            },
        );
        self.inner.broadcast(&event);
    }

    /// Emit a system event with an optional opaque attachment
    pub fn emit_system(&self, kind: SystemEventKind, data: Option<serde_json::Value>) {
        let event = self
            .inner
            .build_event(Source::System, EventPayload::System { event: kind, data });
        self.inner.broadcast(&event);
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.count()
    }

    /// Broadcast statistics
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            subscriber_count: self.inner.registry.count(),
            events_broadcast: self.inner.events_broadcast.load(Ordering::Relaxed),
            write_failures: self.inner.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Stop the heartbeat ticker
    ///
    /// Idempotent. Subscribers stay registered; only the ticker stops.
    pub fn stop_heartbeat(&self) {
        if let Some(handle) = self.inner.heartbeat.lock().take() {
            handle.abort();
            debug!("heartbeat ticker stopped");
        }
    }

    /// Tear the broker down: stop the ticker and drop every subscriber
    ///
    /// Called once at process teardown. Dropped sinks release their
    /// transports; no farewell events are sent.
    pub fn cleanup(&self) {
        self.stop_heartbeat();
        let removed = self.inner.registry.drain();
        info!(removed = removed.len(), "broker cleaned up");
    }
}

impl BrokerInner {
    /// Stamp id, timestamp and source onto a payload
    fn build_event(&self, source: Source, payload: EventPayload) -> Event {
        Event::new(self.next_event_id(), source, payload)
    }

    /// Generate the next event id: `<unix-millis>-<sequence>`
    ///
    /// The sequence makes ids unique within a broker lifetime; the leading
    /// timestamp keeps them usable as a coarse last-seen cursor.
    fn next_event_id(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", chrono::Utc::now().timestamp_millis(), seq)
    }

    fn connection_count_event(&self, count: usize) -> Event {
        self.build_event(
            Source::System,
            EventPayload::System {
                event: SystemEventKind::ConnectionCount,
                data: Some(serde_json::json!({ "count": count })),
            },
        )
    }

    fn broadcast(&self, event: &Event) {
        let frame = match encode_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, kind = %event.kind(), "failed to encode event");
                return;
            }
        };

        let targets = self.registry.snapshot();
        if targets.is_empty() {
            trace!(kind = %event.kind(), "no subscribers");
            return;
        }

        self.events_broadcast.fetch_add(1, Ordering::Relaxed);

        let mut failed: Vec<String> = Vec::new();
        for subscriber in &targets {
            if let Err(e) = subscriber.write(&frame) {
                warn!(id = subscriber.id(), error = %e, "subscriber write failed");
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                failed.push(subscriber.id().to_string());
            }
        }

        // Failed writers leave the registry immediately; each removal
        // notifies the survivors with an updated connection count.
        for id in failed {
            self.remove_subscriber(&id);
        }
    }

    fn remove_subscriber(&self, id: &str) {
        if let Some(remaining) = self.registry.remove(id) {
            debug!(id, remaining, "subscriber removed");
            let event = self.connection_count_event(remaining);
            self.broadcast(&event);
        }
    }

    fn emit_heartbeat(&self) {
        let event = self.build_event(
            Source::System,
            EventPayload::Heartbeat {
                uptime_ms: self.started_at.elapsed().as_millis() as u64,
                memory: memory_snapshot(),
                active_connections: self.registry.count() as u32,
            },
        );
        self.broadcast(&event);
    }
}

/// Spawn the heartbeat ticker task
///
/// The loop only ticks and broadcasts; a failure inside one tick is
/// swallowed by the broadcast path and never ends the ticker.
fn spawn_heartbeat(inner: Arc<BrokerInner>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            inner.emit_heartbeat();
        }
    })
}

/// Statistics about the broker
#[derive(Debug, Clone, Copy)]
pub struct BrokerStats {
    /// Current number of registered subscribers
    pub subscriber_count: usize,
    /// Broadcast calls that reached at least the encoding stage with
    /// one or more subscribers registered
    pub events_broadcast: u64,
    /// Individual sink writes that failed (each one removed a subscriber)
    pub write_failures: u64,
}

#[cfg(test)]
#[path = "broker_test.rs"]
mod tests;
