//! Tests for the event model

use crate::event::*;

/// Helper to build a log event with a fixed id
fn make_log(level: LogLevel, message: &str) -> Event {
    Event::new(
        "1754550000000-1",
        Source::Backend,
        EventPayload::Log {
            level,
            message: message.to_string(),
        },
    )
}

// =============================================================================
// Kind / tag tests
// =============================================================================

#[test]
fn test_kind_matches_payload() {
    assert_eq!(make_log(LogLevel::Info, "x").kind(), EventKind::Log);

    let hb = Event::new(
        "1-1",
        Source::System,
        EventPayload::Heartbeat {
            uptime_ms: 1000,
            memory: MemorySnapshot {
                rss_bytes: 42,
                virtual_bytes: 100,
            },
            active_connections: 3,
        },
    );
    assert_eq!(hb.kind(), EventKind::Heartbeat);
}

#[test]
fn test_kind_parse_roundtrip() {
    for kind in EventKind::ALL {
        assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(EventKind::parse("unknown_kind"), None);
}

// =============================================================================
// Wire shape tests
// =============================================================================

#[test]
fn test_log_event_wire_shape() {
    let event = make_log(LogLevel::Success, "scrape complete");
    let json = serde_json::to_string(&event).unwrap();

    assert!(json.contains(r#""type":"log""#));
    assert!(json.contains(r#""level":"success""#));
    assert!(json.contains(r#""message":"scrape complete""#));
    assert!(json.contains(r#""source":"backend""#));
    assert!(json.contains(r#""id":"1754550000000-1""#));
}

#[test]
fn test_scraping_progress_wire_shape_camel_case() {
    let event = Event::new(
        "2-1",
        Source::Scraping,
        EventPayload::ScrapingProgress {
            progress: 40,
            proxies_found: 12,
            current_source: "free-proxy-list".to_string(),
            status: ScrapeStatus::Progress,
            error: None,
        },
    );
    let json = serde_json::to_string(&event).unwrap();

    assert!(json.contains(r#""type":"scraping_progress""#));
    assert!(json.contains(r#""proxiesFound":12"#));
    assert!(json.contains(r#""currentSource":"free-proxy-list""#));
    assert!(json.contains(r#""status":"progress""#));
    // Optional error is omitted entirely when absent
    assert!(!json.contains("error"));
}

#[test]
fn test_system_event_opaque_data() {
    let event = Event::new(
        "3-1",
        Source::System,
        EventPayload::System {
            event: SystemEventKind::ConnectionCount,
            data: Some(serde_json::json!({"count": 5})),
        },
    );
    let json = serde_json::to_string(&event).unwrap();

    assert!(json.contains(r#""event":"connection_count""#));
    assert!(json.contains(r#""data":{"count":5}"#));

    // Data survives a round trip untouched
    let parsed: Event = serde_json::from_str(&json).unwrap();
    match parsed.payload {
        EventPayload::System { data, .. } => {
            assert_eq!(data.unwrap()["count"], 5);
        }
        _ => panic!("expected System payload"),
    }
}

#[test]
fn test_heartbeat_wire_shape() {
    let event = Event::new(
        "4-1",
        Source::System,
        EventPayload::Heartbeat {
            uptime_ms: 60_000,
            memory: MemorySnapshot {
                rss_bytes: 10 * 1024 * 1024,
                virtual_bytes: 80 * 1024 * 1024,
            },
            active_connections: 2,
        },
    );
    let json = serde_json::to_string(&event).unwrap();

    assert!(json.contains(r#""type":"heartbeat""#));
    assert!(json.contains(r#""uptimeMs":60000"#));
    assert!(json.contains(r#""rssBytes":10485760"#));
    assert!(json.contains(r#""activeConnections":2"#));
}

// =============================================================================
// Deserialization tests
// =============================================================================

#[test]
fn test_roundtrip_all_payloads() {
    let events = vec![
        make_log(LogLevel::Warning, "low proxy count"),
        Event::new(
            "5-1",
            Source::Scraping,
            EventPayload::ScrapingProgress {
                progress: 100,
                proxies_found: 230,
                current_source: "done".to_string(),
                status: ScrapeStatus::Completed,
                error: Some("partial: 2 sources unreachable".to_string()),
            },
        ),
        Event::new(
            "5-2",
            Source::System,
            EventPayload::System {
                event: SystemEventKind::ServerStart,
                data: None,
            },
        ),
    ];

    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}

#[test]
fn test_deserialize_rejects_unknown_type() {
    let json = r#"{"id":"1","type":"mystery","timestamp":"2026-08-07T08:00:00Z","source":"backend"}"#;
    assert!(serde_json::from_str::<Event>(json).is_err());
}

#[test]
fn test_deserialize_rejects_bad_level() {
    let json = r#"{"id":"1","type":"log","timestamp":"2026-08-07T08:00:00Z","source":"backend","level":"fatal","message":"x"}"#;
    assert!(serde_json::from_str::<Event>(json).is_err());
}

#[test]
fn test_timestamp_is_iso8601() {
    let event = make_log(LogLevel::Info, "x");
    let json = serde_json::to_value(&event).unwrap();
    let ts = json["timestamp"].as_str().unwrap();
    assert!(ts.parse::<chrono::DateTime<chrono::Utc>>().is_ok());
}
