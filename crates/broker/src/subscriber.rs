//! Subscriber registry
//!
//! Each connected client gets a `Subscriber` entry that tracks:
//! - Caller-supplied connection id (unique per connection)
//! - The sink to write frames into
//! - Connection and last-successful-write instants
//!
//! The `SubscriberRegistry` serializes all membership changes behind one
//! lock. Invariant: an entry exists if and only if its sink is believed
//! writable - callers must remove a subscriber the moment a write fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::error::SinkError;
use crate::sink::EventSink;

/// A single registered subscriber
#[derive(Debug)]
pub struct Subscriber {
    /// Caller-supplied connection id
    id: String,
    /// Write handle to the subscriber's transport
    sink: Arc<dyn EventSink>,
    /// When the subscriber registered
    connected_at: Instant,
    /// Last successful write
    last_write_at: Mutex<Instant>,
    /// Cleared when the subscriber is removed from the registry
    connected: AtomicBool,
}

impl Subscriber {
    fn new(id: String, sink: Arc<dyn EventSink>) -> Self {
        let now = Instant::now();
        Self {
            id,
            sink,
            connected_at: now,
            last_write_at: Mutex::new(now),
            connected: AtomicBool::new(true),
        }
    }

    /// The connection id
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When this subscriber registered
    #[inline]
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Instant of the last successful write
    pub fn last_write_at(&self) -> Instant {
        *self.last_write_at.lock()
    }

    /// Whether this subscriber is still in the registry
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Write one frame to the sink, stamping `last_write_at` on success
    pub fn write(&self, frame: &str) -> Result<(), SinkError> {
        self.sink.write(frame)?;
        *self.last_write_at.lock() = Instant::now();
        Ok(())
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

/// The live-subscriber registry
///
/// Membership changes take the write lock; broadcasts snapshot under the
/// read lock and write to sinks outside it, so a slow sink never holds
/// the registry.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    /// Active subscribers, in registration order
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink under `id`, replacing any prior entry for that id
    ///
    /// Last registration wins - a client that re-subscribes under the same
    /// id silently supersedes its old connection. Returns the new entry
    /// and the registry size after insertion.
    pub fn insert(&self, id: &str, sink: Arc<dyn EventSink>) -> (Arc<Subscriber>, usize) {
        let subscriber = Arc::new(Subscriber::new(id.to_string(), sink));

        let mut subscribers = self.subscribers.write();
        if let Some(old) = subscribers.iter().find(|s| s.id() == id) {
            old.mark_disconnected();
        }
        subscribers.retain(|s| s.id() != id);
        subscribers.push(Arc::clone(&subscriber));

        (subscriber, subscribers.len())
    }

    /// Remove the entry for `id`, if present
    ///
    /// Idempotent: returns the remaining count when something was removed,
    /// `None` when the id was not registered.
    pub fn remove(&self, id: &str) -> Option<usize> {
        let mut subscribers = self.subscribers.write();
        let original_len = subscribers.len();

        for subscriber in subscribers.iter().filter(|s| s.id() == id) {
            subscriber.mark_disconnected();
        }
        subscribers.retain(|s| s.id() != id);

        if subscribers.len() == original_len {
            return None;
        }
        Some(subscribers.len())
    }

    /// Remove every subscriber, returning the removed entries
    pub fn drain(&self) -> Vec<Arc<Subscriber>> {
        let mut subscribers = self.subscribers.write();
        let drained = std::mem::take(&mut *subscribers);
        for subscriber in &drained {
            subscriber.mark_disconnected();
        }
        drained
    }

    /// Number of registered subscribers
    pub fn count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Snapshot of the current subscriber set, in registration order
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.read().clone()
    }
}

#[cfg(test)]
#[path = "subscriber_test.rs"]
mod tests;
