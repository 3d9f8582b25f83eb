//! Volatile in-process event store.

use super::store::{AppendReport, EventFilter, EventStore, IngestRun};
use crate::error::Result;
use crate::types::Event;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    ids: HashSet<String>,
    runs: Vec<IngestRun>,
}

/// Event store that lives only as long as the process.
///
/// Used by `tracefold-serve --memory` and by tests that do not need SQLite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recorded ingest runs, oldest first
    pub fn runs(&self) -> Vec<IngestRun> {
        self.lock().runs.clone()
    }
}

impl EventStore for MemoryStore {
    fn append_if_absent(&self, events: &[Event]) -> Result<AppendReport> {
        let mut inner = self.lock();
        let mut report = AppendReport::default();

        for event in events {
            if inner.ids.insert(event.id.clone()) {
                inner.events.push(event.clone());
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }

        Ok(report)
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let inner = self.lock();
        let mut matched: Vec<Event> = inner
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn count(&self) -> Result<u64> {
        Ok(self.lock().events.len() as u64)
    }

    fn clear(&self) -> Result<usize> {
        let mut inner = self.lock();
        let removed = inner.events.len();
        inner.events.clear();
        inner.ids.clear();
        Ok(removed)
    }

    fn record_run(&self, run: &IngestRun) -> Result<()> {
        self.lock().runs.push(run.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{event_type, Source};
    use chrono::{Duration, TimeZone, Utc};

    fn event(actor: &str, hours_ago: i64) -> Event {
        let base = Utc.with_ymd_and_hms(2023, 10, 10, 12, 0, 0).unwrap();
        Event::new(
            Source::Discord,
            base - Duration::hours(hours_ago),
            actor,
            event_type::CHAT_MESSAGE,
            &[],
            "msg",
            300,
        )
    }

    #[test]
    fn test_append_if_absent() {
        let store = MemoryStore::new();
        let a = event("a", 1);

        let report = store.append_if_absent(&[a.clone(), a.clone()]).unwrap();
        assert_eq!(report, AppendReport { inserted: 1, duplicates: 1 });
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_query_is_newest_first() {
        let store = MemoryStore::new();
        store
            .append_if_absent(&[event("old", 10), event("new", 1), event("mid", 5)])
            .unwrap();

        let actors: Vec<_> = store
            .query(&EventFilter::default())
            .unwrap()
            .into_iter()
            .map(|e| e.actor)
            .collect();
        assert_eq!(actors, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_clear_allows_reinsert() {
        let store = MemoryStore::new();
        let a = event("a", 1);
        store.append_if_absent(std::slice::from_ref(&a)).unwrap();

        assert_eq!(store.clear().unwrap(), 1);
        let report = store.append_if_absent(&[a]).unwrap();
        assert_eq!(report.inserted, 1);
    }
}
