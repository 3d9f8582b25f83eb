//! Event store abstraction
//!
//! The ingestion pipeline and the aggregator only see [`EventStore`]; the
//! concrete store is constructed by the caller and injected. Two stores
//! ship with the crate: the SQLite-backed [`Database`](super::Database) and
//! the volatile [`MemoryStore`](super::MemoryStore).

use crate::error::Result;
use crate::types::{Event, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of appending a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReport {
    /// Events that were not stored before
    pub inserted: usize,
    /// Events whose id was already present (including repeats within the batch)
    pub duplicates: usize,
}

/// One ingested document, kept for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRun {
    pub name: String,
    /// Detection tag, or `github-api` for API imports
    pub detected: String,
    pub produced: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Event query. All set fields must match; results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Inclusive lower bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub until: Option<DateTime<Utc>>,
    pub source: Option<Source>,
    pub actor: Option<String>,
    /// Event must carry this tag
    pub tag: Option<String>,
    /// Maximum number of events to return
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Events at or after `since`.
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Default::default()
        }
    }

    /// Whether an event passes every filter except `limit`.
    pub fn matches(&self, event: &Event) -> bool {
        self.since.map_or(true, |since| event.timestamp >= since)
            && self.until.map_or(true, |until| event.timestamp < until)
            && self.source.map_or(true, |source| event.source == source)
            && self.actor.as_deref().map_or(true, |actor| event.actor == actor)
            && self.tag.as_deref().map_or(true, |tag| event.has_tag(tag))
    }
}

/// Append-only keyed event storage.
///
/// Implementations must treat ids as unique keys: appending an event whose
/// id is already stored is a no-op that counts as a duplicate, never an
/// error.
pub trait EventStore: Send + Sync {
    /// Insert every event whose id is not yet stored.
    fn append_if_absent(&self, events: &[Event]) -> Result<AppendReport>;

    /// Events matching `filter`, newest first.
    fn query(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Number of stored events.
    fn count(&self) -> Result<u64>;

    /// Remove every event; returns how many were removed.
    fn clear(&self) -> Result<usize>;

    /// Record an ingestion for auditing. Stores without an audit trail
    /// ignore it.
    fn record_run(&self, _run: &IngestRun) -> Result<()> {
        Ok(())
    }
}

impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    fn append_if_absent(&self, events: &[Event]) -> Result<AppendReport> {
        (**self).append_if_absent(events)
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        (**self).query(filter)
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }

    fn clear(&self) -> Result<usize> {
        (**self).clear()
    }

    fn record_run(&self, run: &IngestRun) -> Result<()> {
        (**self).record_run(run)
    }
}

impl<S: EventStore + ?Sized> EventStore for &S {
    fn append_if_absent(&self, events: &[Event]) -> Result<AppendReport> {
        (**self).append_if_absent(events)
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        (**self).query(filter)
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }

    fn clear(&self) -> Result<usize> {
        (**self).clear()
    }

    fn record_run(&self, run: &IngestRun) -> Result<()> {
        (**self).record_run(run)
    }
}
