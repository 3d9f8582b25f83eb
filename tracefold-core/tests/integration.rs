//! Integration tests for the tracefold ingestion pipeline
//!
//! These tests use fixture files in `tests/fixtures/` to verify detection,
//! parsing, storage and aggregation end to end.

use chrono::{TimeZone, Utc};
use tracefold_core::analytics::{aggregate_window, digest_window, ActivitySummary};
use tracefold_core::config::{AggregateConfig, IngestConfig};
use tracefold_core::db::{Database, MemoryStore};
use tracefold_core::ingest::{parse_document, IngestCoordinator};
use tracefold_core::types::{AggregateQuery, DetectedFormat, Source};
use tracefold_core::{Error, EventFilter, EventStore};
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_text(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

/// Coordinator over a migrated in-memory database
fn coordinator() -> IngestCoordinator<Database> {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    IngestCoordinator::new(db, IngestConfig::default())
}

// ============================================
// Detection + Parsing
// ============================================

#[test]
fn test_git_log_fixture() {
    let parsed = parse_document(&fixture_text("git.log"), Utc::now());

    assert_eq!(parsed.detected, DetectedFormat::Git);
    assert_eq!(parsed.events.len(), 4);
    assert_eq!(parsed.skipped, 1);

    let first = &parsed.events[0];
    assert_eq!(first.source, Source::Git);
    assert_eq!(first.actor, "Alice");
    assert_eq!(first.event_type, "code.commit");
    assert!(first.has_tag("bugfix"));
    assert_eq!(first.iso_timestamp(), "2023-10-01T10:00:00.000Z");

    assert!(parsed.events[1].has_tag("feature"));
    assert!(parsed.events[2].has_tag("bugfix"));
    assert!(parsed.events[3].content_snippet.contains("with pipes"));
}

#[test]
fn test_whatsapp_fixture_folds_continuations() {
    let parsed = parse_document(&fixture_text("whatsapp.txt"), Utc::now());

    assert_eq!(parsed.detected, DetectedFormat::WhatsApp);
    assert_eq!(parsed.events.len(), 3);
    assert_eq!(
        parsed.events[1].content_snippet,
        "Sure bring the notes from last week"
    );
    assert!(parsed.events[0].has_tag("study"));
    assert!(!parsed.events[1].has_tag("study"));
    assert!(parsed.events[2].has_tag("study"));
}

#[test]
fn test_slack_fixture() {
    let parsed = parse_document(&fixture_text("slack.json"), Utc::now());

    assert_eq!(parsed.detected, DetectedFormat::Slack);
    assert_eq!(parsed.events.len(), 2);
    assert_eq!(parsed.skipped, 1);
    assert_eq!(parsed.events[0].actor, "Alice Smith");
    assert_eq!(parsed.events[0].iso_timestamp(), "2023-10-01T10:00:00.000Z");
    assert_eq!(parsed.events[1].actor, "U02");
}

#[test]
fn test_discord_fixture() {
    let parsed = parse_document(&fixture_text("discord.json"), Utc::now());

    assert_eq!(parsed.detected, DetectedFormat::Discord);
    assert_eq!(parsed.events.len(), 2);
    assert_eq!(parsed.skipped, 1);
    assert_eq!(parsed.events[0].actor, "alice");
    assert_eq!(parsed.events[1].actor, "bob");
}

#[test]
fn test_telegram_fixture() {
    let parsed = parse_document(&fixture_text("telegram.json"), Utc::now());

    assert_eq!(parsed.detected, DetectedFormat::Telegram);
    assert_eq!(parsed.events.len(), 2);
    assert_eq!(parsed.events[1].content_snippet, "See https://example.com");
}

#[test]
fn test_calendar_fixture() {
    let parsed = parse_document(&fixture_text("calendar.ics"), Utc::now());

    assert_eq!(parsed.detected, DetectedFormat::Calendar);
    assert_eq!(parsed.events.len(), 2);
    assert_eq!(parsed.skipped, 1);

    let standup = &parsed.events[0];
    assert_eq!(standup.actor, "me");
    assert!(standup.has_tag("meeting"));
    assert!(standup.content_snippet.starts_with("Standup - Daily sync with the"));
    assert!(standup.content_snippet.contains("whole team"));

    assert_eq!(parsed.events[1].iso_timestamp(), "2023-10-02T00:00:00.000Z");
}

#[test]
fn test_unrecognized_text_is_wrapped() {
    let received_at = Utc.with_ymd_and_hms(2023, 10, 5, 8, 0, 0).unwrap();
    let parsed = parse_document("just some notes\nnothing structured here", received_at);

    assert_eq!(parsed.detected, DetectedFormat::Raw);
    assert_eq!(parsed.events.len(), 1);
    assert_eq!(parsed.events[0].actor, "uploader");
    assert_eq!(parsed.events[0].timestamp, received_at);
}

// ============================================
// Storage
// ============================================

#[test]
fn test_reingest_is_idempotent() {
    let coordinator = coordinator();
    let bytes = std::fs::read(fixture_path("git.log")).unwrap();

    let first = coordinator.ingest_bytes(&bytes, "git.log").unwrap();
    assert_eq!(first.count, 4);
    assert_eq!(first.inserted, 4);

    let second = coordinator.ingest_bytes(&bytes, "git.log").unwrap();
    assert_eq!(second.count, 4);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 4);

    assert_eq!(coordinator.store().count().unwrap(), 4);

    let runs = coordinator.store().recent_ingest_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
}

#[test]
fn test_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("events.db");

    {
        let db = Database::open(&db_path).unwrap();
        db.migrate().unwrap();
        let coordinator = IngestCoordinator::new(db, IngestConfig::default());
        coordinator.ingest_path(&fixture_path("slack.json")).unwrap();
    }

    let db = Database::open(&db_path).unwrap();
    db.migrate().unwrap();
    let events = db.query(&EventFilter::default()).unwrap();
    assert_eq!(events.len(), 2);
    // newest first
    assert_eq!(events[0].actor, "U02");
}

#[test]
fn test_stores_agree_on_sub_millisecond_timestamps() {
    let text = r#"[{"author": {"username": "dan"}, "content": "hi", "timestamp": "2023-10-01T10:00:00.123456Z"}]"#;
    let parsed = parse_document(text, Utc::now());
    assert_eq!(parsed.detected, DetectedFormat::Discord);

    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    let memory = MemoryStore::new();
    db.append_if_absent(&parsed.events).unwrap();
    memory.append_if_absent(&parsed.events).unwrap();

    let from_db = db.query(&EventFilter::default()).unwrap();
    let from_memory = memory.query(&EventFilter::default()).unwrap();
    assert_eq!(from_db, from_memory);
    assert_eq!(from_db[0].iso_timestamp(), "2023-10-01T10:00:00.123Z");
}

#[test]
fn test_batch_collects_errors() {
    let coordinator = coordinator();
    let paths = vec![
        fixture_path("git.log"),
        fixture_path("missing.txt"),
        fixture_path("calendar.ics"),
    ];

    let mut seen = Vec::new();
    let batch = coordinator.ingest_paths(&paths, |i, total, _| seen.push((i, total)));

    assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3)]);
    assert_eq!(batch.reports.len(), 2);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.events_inserted(), 6);
}

#[test]
fn test_glob_ingests_every_fixture() {
    let coordinator = coordinator();
    let pattern = fixture_path("*").display().to_string();

    let batch = coordinator.ingest_glob(&pattern, |_, _, _| {}).unwrap();

    assert_eq!(batch.reports.len(), 6);
    assert!(batch.errors.is_empty());
    assert_eq!(batch.events_produced(), 4 + 3 + 2 + 2 + 2 + 2);
}

#[test]
fn test_oversize_upload_rejected() {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    let coordinator = IngestCoordinator::new(
        db,
        IngestConfig {
            max_upload_bytes: 16,
        },
    );

    let err = coordinator
        .ingest_path(&fixture_path("git.log"))
        .unwrap_err();
    assert!(matches!(err, Error::UploadTooLarge { limit: 16, .. }));
    assert_eq!(coordinator.store().count().unwrap(), 0);
}

// ============================================
// Aggregation
// ============================================

#[test]
fn test_aggregate_stored_events() {
    let coordinator = coordinator();
    coordinator.ingest_path(&fixture_path("git.log")).unwrap();
    coordinator.ingest_path(&fixture_path("slack.json")).unwrap();

    let now = Utc.with_ymd_and_hms(2023, 10, 4, 20, 0, 0).unwrap();
    let config = AggregateConfig::default();

    let aggregate =
        aggregate_window(coordinator.store(), &AggregateQuery::new(7), &config, &now).unwrap();
    assert_eq!(aggregate.days(), 7);
    assert_eq!(aggregate.total(), 6);
    // 2023-10-01T10:00Z is three days before `now`
    assert_eq!(aggregate.matrix[3][10], 2);
    assert_eq!(aggregate.actors[0].name, "Alice");
    assert_eq!(aggregate.actors[0].count, 3);

    let query = AggregateQuery {
        source: Some(Source::Slack),
        ..AggregateQuery::new(7)
    };
    let slack_only = aggregate_window(coordinator.store(), &query, &config, &now).unwrap();
    assert_eq!(slack_only.total(), 2);

    let summary = ActivitySummary::from_aggregate(&aggregate, now.date_naive());
    assert_eq!(summary.total_events, 6);
    assert_eq!(summary.active_days, 4);
    assert_eq!(summary.current_streak, 4);

    let digest = digest_window(coordinator.store(), 7, &config, now).unwrap();
    assert_eq!(digest.total_events, 6);
    assert!(digest.sources.contains(&Source::Git));
}

#[test]
fn test_aggregate_rejects_bad_window() {
    let coordinator = coordinator();
    let now = Utc::now();
    let err = aggregate_window(
        coordinator.store(),
        &AggregateQuery::new(0),
        &AggregateConfig::default(),
        &now,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}
