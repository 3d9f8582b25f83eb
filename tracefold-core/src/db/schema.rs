//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: canonical events
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id               TEXT PRIMARY KEY,      -- content hash
        timestamp        TEXT NOT NULL,         -- ISO-8601 UTC, millisecond precision
        source           TEXT NOT NULL,
        actor            TEXT NOT NULL,
        event_type       TEXT NOT NULL,
        tags             JSON NOT NULL DEFAULT '[]',
        content_snippet  TEXT NOT NULL,

        -- Filled by the external enrichment collaborator, never by ingestion
        analysis         JSON,

        ingested_at      TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
    CREATE INDEX IF NOT EXISTS idx_events_source ON events(source, timestamp);
    CREATE INDEX IF NOT EXISTS idx_events_actor ON events(actor);
    "#,
    // Version 2: ingestion audit trail
    r#"
    CREATE TABLE IF NOT EXISTS ingest_runs (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        name             TEXT NOT NULL,
        detected         TEXT NOT NULL,
        produced         INTEGER NOT NULL,
        inserted         INTEGER NOT NULL,
        duplicates       INTEGER NOT NULL,
        skipped          INTEGER NOT NULL,
        ingested_at      TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ingest_runs_time ON ingest_runs(ingested_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
