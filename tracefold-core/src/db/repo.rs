//! SQLite-backed event repository

use super::schema;
use super::store::{AppendReport, EventFilter, EventStore, IngestRun};
use crate::error::Result;
use crate::ingest::identity::iso_timestamp;
use crate::types::{Event, Source};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Database handle
///
/// Wraps a single connection behind a mutex so the handle can be shared
/// between the HTTP server and ingestion workers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets readers proceed while a worker is appending
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        schema::run_migrations(&self.conn())
    }

    /// Lock the connection. A panic in another holder does not leave the
    /// connection itself in a bad state, so poisoning is ignored.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Event operations
    // ============================================

    /// Insert events, ignoring ids that are already stored.
    ///
    /// The batch is one transaction: a storage failure leaves nothing behind.
    pub fn insert_events(&self, events: &[Event]) -> Result<AppendReport> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let ingested_at = iso_timestamp(&Utc::now());
        let mut report = AppendReport::default();

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO events
                    (id, timestamp, source, actor, event_type, tags, content_snippet, ingested_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for event in events {
                let changed = stmt.execute(params![
                    event.id,
                    event.iso_timestamp(),
                    event.source.as_str(),
                    event.actor,
                    event.event_type,
                    serde_json::to_string(&event.tags)?,
                    event.content_snippet,
                    ingested_at,
                ])?;
                if changed == 0 {
                    report.duplicates += 1;
                } else {
                    report.inserted += 1;
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }

    /// Events matching a filter, newest first.
    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let conn = self.conn();

        let mut sql = String::from(
            "SELECT id, timestamp, source, actor, event_type, tags, content_snippet \
             FROM events WHERE 1=1",
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![];

        if let Some(since) = &filter.since {
            sql.push_str(" AND timestamp >= ?");
            params.push(Box::new(iso_timestamp(since)));
        }

        if let Some(until) = &filter.until {
            sql.push_str(" AND timestamp < ?");
            params.push(Box::new(iso_timestamp(until)));
        }

        if let Some(source) = &filter.source {
            sql.push_str(" AND source = ?");
            params.push(Box::new(source.as_str().to_string()));
        }

        if let Some(actor) = &filter.actor {
            sql.push_str(" AND actor = ?");
            params.push(Box::new(actor.clone()));
        }

        if let Some(tag) = &filter.tag {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(events.tags) WHERE value = ?)");
            params.push(Box::new(tag.clone()));
        }

        sql.push_str(" ORDER BY timestamp DESC, id ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(params.iter().map(|p| p.as_ref())), |row| {
                Self::row_to_event(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Look up one event by id.
    pub fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, source, actor, event_type, tags, content_snippet \
             FROM events WHERE id = ?",
        )?;
        let mut rows = stmt.query_map([id], |row| Self::row_to_event(row))?;
        let event = rows.next().transpose()?;
        Ok(event)
    }

    /// Number of stored events
    pub fn count_events(&self) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Delete every event; returns how many were removed.
    pub fn clear_events(&self) -> Result<usize> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM events", [])?;
        tracing::warn!(removed, "Cleared event store");
        Ok(removed)
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
        let timestamp_str: String = row.get("timestamp")?;
        let source_str: String = row.get("source")?;
        let tags_str: String = row.get("tags")?;

        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(1, e))?;
        let source: Source = source_str
            .parse()
            .map_err(|e: String| conversion_error(2, std::io::Error::other(e)))?;
        let tags: BTreeSet<String> =
            serde_json::from_str(&tags_str).map_err(|e| conversion_error(5, e))?;

        Ok(Event {
            id: row.get("id")?,
            timestamp,
            source,
            actor: row.get("actor")?,
            event_type: row.get("event_type")?,
            tags,
            content_snippet: row.get("content_snippet")?,
        })
    }

    // ============================================
    // Ingest run operations
    // ============================================

    /// Record one ingested document
    pub fn record_ingest_run(&self, run: &IngestRun) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO ingest_runs (name, detected, produced, inserted, duplicates, skipped, ingested_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                run.name,
                run.detected,
                run.produced as i64,
                run.inserted as i64,
                run.duplicates as i64,
                run.skipped as i64,
                iso_timestamp(&run.ingested_at),
            ],
        )?;
        Ok(())
    }

    /// Most recent ingest runs, newest first
    pub fn recent_ingest_runs(&self, limit: usize) -> Result<Vec<IngestRun>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, detected, produced, inserted, duplicates, skipped, ingested_at \
             FROM ingest_runs ORDER BY id DESC LIMIT ?",
        )?;

        let runs = stmt
            .query_map([limit as i64], |row| {
                let ingested_at: String = row.get("ingested_at")?;
                Ok(IngestRun {
                    name: row.get("name")?,
                    detected: row.get("detected")?,
                    produced: row.get::<_, i64>("produced")? as usize,
                    inserted: row.get::<_, i64>("inserted")? as usize,
                    duplicates: row.get::<_, i64>("duplicates")? as usize,
                    skipped: row.get::<_, i64>("skipped")? as usize,
                    ingested_at: DateTime::parse_from_rfc3339(&ingested_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| conversion_error(6, e))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

impl EventStore for Database {
    fn append_if_absent(&self, events: &[Event]) -> Result<AppendReport> {
        self.insert_events(events)
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.query_events(filter)
    }

    fn count(&self) -> Result<u64> {
        self.count_events()
    }

    fn clear(&self) -> Result<usize> {
        self.clear_events()
    }

    fn record_run(&self, run: &IngestRun) -> Result<()> {
        self.record_ingest_run(run)
    }
}
