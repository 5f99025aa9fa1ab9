//! Event handlers
//!
//! A `Handlers` value maps event type tags to callbacks, plus one optional
//! raw-frame fallback for frames whose type the client does not recognize.
//! Registered with `StreamClient::on`; later registrations for the same
//! type override earlier ones.

use std::collections::HashMap;

use relay_protocol::{Event, EventKind, Frame};

/// Callback for one decoded event
pub type EventHandler = Box<dyn Fn(&Event) + Send + Sync>;

/// Callback for an unrecognized raw frame
pub type FrameHandler = Box<dyn Fn(&Frame) + Send + Sync>;

/// Per-type callback map
#[derive(Default)]
pub struct Handlers {
    typed: HashMap<EventKind, EventHandler>,
    raw: Option<FrameHandler>,
}

impl Handlers {
    /// Create an empty handler map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event type
    pub fn on_event(mut self, kind: EventKind, handler: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.typed.insert(kind, Box::new(handler));
        self
    }

    /// Register the fallback for frames with an unrecognized type
    pub fn on_raw_frame(mut self, handler: impl Fn(&Frame) + Send + Sync + 'static) -> Self {
        self.raw = Some(Box::new(handler));
        self
    }

    /// Merge `other` into `self`; `other` wins on conflicts
    pub(crate) fn merge(&mut self, other: Handlers) {
        self.typed.extend(other.typed);
        if other.raw.is_some() {
            self.raw = other.raw;
        }
    }

    /// Invoke the handler registered for this event's type, if any
    pub(crate) fn dispatch_event(&self, event: &Event) {
        if let Some(handler) = self.typed.get(&event.kind()) {
            handler(event);
        }
    }

    /// Invoke the raw-frame fallback, if registered
    pub(crate) fn dispatch_raw(&self, frame: &Frame) {
        if let Some(handler) = &self.raw {
            handler(frame);
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("typed", &self.typed.keys().collect::<Vec<_>>())
            .field("raw", &self.raw.is_some())
            .finish()
    }
}
