//! Event model
//!
//! Every message on the stream is an `Event`: an envelope (id, timestamp,
//! source) around one of four tagged payloads. Events are immutable once
//! constructed - the broker stamps `id` and `timestamp` at emit time,
//! producers only supply the payload.
//!
//! The JSON wire shape is flat: envelope fields and payload fields share
//! one object, discriminated by `type`:
//!
//! ```json
//! {"id":"1754550000000-7","type":"log","timestamp":"2026-08-07T08:00:00Z",
//!  "source":"backend","level":"info","message":"hello"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Opaque unique id, monotonic-enough to serve as a last-seen cursor
    pub id: String,

    /// Creation instant, stamped by the broker (never the producer)
    pub timestamp: DateTime<Utc>,

    /// Coarse origin tag, informational only
    pub source: Source,

    /// Type-discriminated payload, flattened into the envelope on the wire
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Build an event stamped with the current instant
    pub fn new(id: impl Into<String>, source: Source, payload: EventPayload) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            source,
            payload,
        }
    }

    /// The type tag of this event's payload
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Coarse event origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Backend,
    Scraping,
    System,
}

impl Source {
    /// Get string representation
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Scraping => "scraping",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The payloads an event can carry, discriminated by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A log line from the backend
    Log { level: LogLevel, message: String },

    /// Progress of a scraping run
    #[serde(rename_all = "camelCase")]
    ScrapingProgress {
        /// Completion percentage, 0..=100
        progress: u8,
        /// Proxies found so far
        proxies_found: u32,
        /// Source currently being scraped
        current_source: String,
        status: ScrapeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A system-level notice
    System {
        event: SystemEventKind,
        /// Opaque, uninterpreted attachment - consumers decide what it means
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },

    /// Periodic liveness beacon with a resource snapshot
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        uptime_ms: u64,
        memory: MemorySnapshot,
        active_connections: u32,
    },
}

impl EventPayload {
    /// The type tag for this payload
    #[inline]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Log { .. } => EventKind::Log,
            Self::ScrapingProgress { .. } => EventKind::ScrapingProgress,
            Self::System { .. } => EventKind::System,
            Self::Heartbeat { .. } => EventKind::Heartbeat,
        }
    }
}

/// Event type tags - the `event:` line of a frame and the handler key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Log,
    ScrapingProgress,
    System,
    Heartbeat,
}

impl EventKind {
    /// All kinds, in a fixed order (useful for registering handlers)
    pub const ALL: [EventKind; 4] = [
        Self::Log,
        Self::ScrapingProgress,
        Self::System,
        Self::Heartbeat,
    ];

    /// Get string representation
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::ScrapingProgress => "scraping_progress",
            Self::System => "system",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Parse from the wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "log" => Some(Self::Log),
            "scraping_progress" => Some(Self::ScrapingProgress),
            "system" => Some(Self::System),
            "heartbeat" => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
    Warning,
    Success,
}

impl LogLevel {
    /// Get string representation
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Success => "success",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle phase of a scraping run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Started,
    Progress,
    Completed,
    Error,
}

impl ScrapeStatus {
    /// Get string representation
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of system notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventKind {
    ServerStart,
    ServerError,
    HighLoad,
    ConnectionCount,
}

impl SystemEventKind {
    /// Get string representation
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerStart => "server_start",
            Self::ServerError => "server_error",
            Self::HighLoad => "high_load",
            Self::ConnectionCount => "connection_count",
        }
    }
}

impl std::fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process resource snapshot carried by heartbeat events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Resident set size in bytes
    pub rss_bytes: u64,
    /// Virtual memory size in bytes
    pub virtual_bytes: u64,
}
