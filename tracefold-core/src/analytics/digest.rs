//! Compact activity digest for the external AI collaborator.
//!
//! The collaborator never sees raw event text, only daily event counts per
//! source, which keeps the payload small and free of message content.

use crate::config::AggregateConfig;
use crate::db::{EventFilter, EventStore};
use crate::error::Result;
use crate::types::{Event, Source};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Daily event counts by source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    /// Window length in days
    pub days: u32,
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    /// Sources present in the window
    pub sources: BTreeSet<Source>,
    /// UTC date → source → count
    pub daily: BTreeMap<NaiveDate, BTreeMap<Source, u64>>,
}

impl Digest {
    /// Group events by UTC calendar date and source.
    pub fn build(events: &[Event], days: u32, generated_at: DateTime<Utc>) -> Self {
        let mut sources = BTreeSet::new();
        let mut daily: BTreeMap<NaiveDate, BTreeMap<Source, u64>> = BTreeMap::new();

        for event in events {
            sources.insert(event.source);
            *daily
                .entry(event.timestamp.date_naive())
                .or_default()
                .entry(event.source)
                .or_default() += 1;
        }

        Self {
            days,
            generated_at,
            total_events: events.len(),
            sources,
            daily,
        }
    }
}

/// Digest of the last `days` days ending at `now`.
pub fn digest_window<S: EventStore + ?Sized>(
    store: &S,
    days: u32,
    config: &AggregateConfig,
    now: DateTime<Utc>,
) -> Result<Digest> {
    let days = config.validate_days(days)?;
    let events = store.query(&EventFilter::since(now - Duration::days(days as i64)))?;
    Ok(Digest::build(&events, days, now))
}
