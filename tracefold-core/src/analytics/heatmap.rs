//! Day×hour activity matrix and actor ranking.
//!
//! Row 0 of the matrix is "today" in the caller's time zone, row `i` is `i`
//! calendar days earlier. Columns are local hours. Events in the future or
//! older than the window are kept in the event list but not counted.

use crate::config::AggregateConfig;
use crate::db::{EventFilter, EventStore};
use crate::error::Result;
use crate::types::{ActorCount, Aggregate, AggregateQuery, Event, HOURS_PER_DAY};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use std::collections::HashMap;

/// Bucket events into a `days`×24 matrix relative to `now`.
///
/// Generic over the time zone so tests can pin one; callers pass
/// `Local::now()`.
pub fn aggregate<Tz: TimeZone>(events: Vec<Event>, days: usize, now: &DateTime<Tz>) -> Aggregate {
    let tz = now.timezone();
    let today = now.date_naive();
    let mut matrix = vec![[0u32; HOURS_PER_DAY]; days];

    for event in &events {
        let local = event.timestamp.with_timezone(&tz);
        let day_delta = (today - local.date_naive()).num_days();
        if day_delta < 0 {
            continue;
        }
        if let Some(row) = matrix.get_mut(day_delta as usize) {
            row[local.hour() as usize] += 1;
        }
    }

    let actors = rank_actors(&events);
    Aggregate {
        matrix,
        events,
        actors,
    }
}

/// Count events per actor, most frequent first.
///
/// Ties keep the order in which actors were first seen.
pub fn rank_actors(events: &[Event]) -> Vec<ActorCount> {
    let mut ranking: Vec<ActorCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        match index.get(event.actor.as_str()) {
            Some(&i) => ranking[i].count += 1,
            None => {
                index.insert(event.actor.as_str(), ranking.len());
                ranking.push(ActorCount {
                    name: event.actor.clone(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking
}

/// Query the store for the window described by `query` and aggregate it.
///
/// Fetches events with `timestamp >= now - days`, newest first.
pub fn aggregate_window<S, Tz>(
    store: &S,
    query: &AggregateQuery,
    config: &AggregateConfig,
    now: &DateTime<Tz>,
) -> Result<Aggregate>
where
    S: EventStore + ?Sized,
    Tz: TimeZone,
{
    let days = config.validate_days(query.days)?;
    let events = store.query(&window_filter(query, now))?;

    tracing::debug!(
        days,
        events = events.len(),
        source = ?query.source,
        actor = ?query.actor,
        tag = ?query.tag,
        "Aggregating window"
    );

    Ok(aggregate(events, days as usize, now))
}

/// Store filter for a query window ending at `now`.
pub fn window_filter<Tz: TimeZone>(query: &AggregateQuery, now: &DateTime<Tz>) -> EventFilter {
    let since = now.with_timezone(&Utc) - Duration::days(query.days as i64);
    EventFilter {
        since: Some(since),
        until: None,
        source: query.source,
        actor: query.actor.clone(),
        tag: query.tag.clone(),
        limit: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::Error;
    use crate::types::{event_type, Source};
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn event(actor: &str, ts: DateTime<Utc>) -> Event {
        Event::new(
            Source::Slack,
            ts,
            actor,
            event_type::CHAT_MESSAGE,
            &[],
            &format!("{} at {}", actor, ts),
            300,
        )
    }

    #[test]
    fn test_buckets_by_day_and_hour() {
        let now = utc(2023, 10, 10, 18, 0);
        let events = vec![
            event("a", utc(2023, 10, 10, 9, 15)),
            event("a", utc(2023, 10, 10, 9, 45)),
            event("b", utc(2023, 10, 9, 23, 59)),
            event("c", utc(2023, 10, 1, 0, 0)),
        ];

        let agg = aggregate(events, 30, &now);

        assert_eq!(agg.days(), 30);
        assert_eq!(agg.matrix[0][9], 2);
        assert_eq!(agg.matrix[1][23], 1);
        assert_eq!(agg.matrix[9][0], 1);
        assert_eq!(agg.total(), 4);
    }

    #[test]
    fn test_out_of_window_events_not_counted() {
        let now = utc(2023, 10, 10, 12, 0);
        let events = vec![
            event("future", utc(2023, 10, 11, 1, 0)),
            event("old", utc(2023, 10, 3, 12, 0)),
            event("edge", utc(2023, 10, 4, 0, 0)),
        ];

        let agg = aggregate(events, 7, &now);

        assert_eq!(agg.total(), 1);
        assert_eq!(agg.matrix[6][0], 1);
        // Events stay in the list even when not counted
        assert_eq!(agg.events.len(), 3);
    }

    #[test]
    fn test_local_time_zone_shifts_buckets() {
        // 02:30 UTC on the 10th is 21:30 on the 9th at UTC-5
        let zone = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = utc(2023, 10, 10, 15, 0).with_timezone(&zone);
        let agg = aggregate(vec![event("a", utc(2023, 10, 10, 2, 30))], 3, &now);

        assert_eq!(agg.matrix[1][21], 1);
        assert_eq!(agg.total(), 1);
    }

    #[test]
    fn test_row_sums_match_day_counts() {
        let now = utc(2023, 10, 10, 23, 0);
        let events: Vec<_> = (0..48)
            .map(|i| event("a", utc(2023, 10, 10, 0, 0) - Duration::hours(i)))
            .collect();

        let agg = aggregate(events, 2, &now);

        assert_eq!(agg.daily_totals(), vec![1, 24]);
        assert!(agg.matrix[1].iter().all(|&c| c == 1));
    }

    #[test]
    fn test_rank_actors_orders_by_count_then_first_seen() {
        let ts = utc(2023, 10, 10, 9, 0);
        let events = vec![
            event("carol", ts),
            event("alice", ts),
            event("bob", ts),
            event("alice", ts),
            event("bob", ts),
        ];

        let names: Vec<_> = rank_actors(&events)
            .into_iter()
            .map(|a| (a.name, a.count))
            .collect();
        assert_eq!(
            names,
            vec![
                ("alice".to_string(), 2),
                ("bob".to_string(), 2),
                ("carol".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_same_events_same_aggregate() {
        let now = utc(2023, 10, 10, 18, 0);
        let events = vec![
            event("bob", utc(2023, 10, 10, 9, 15)),
            event("alice", utc(2023, 10, 9, 23, 59)),
            event("bob", utc(2023, 10, 8, 7, 0)),
            event("alice", utc(2023, 10, 8, 7, 30)),
            event("carol", utc(2023, 10, 1, 0, 0)),
        ];

        let first = aggregate(events.clone(), 14, &now);
        let second = aggregate(events, 14, &now);

        assert_eq!(first.matrix, second.matrix);
        assert_eq!(first.actors, second.actors);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let agg = aggregate(Vec::new(), 5, &Utc::now());
        assert_eq!(agg.days(), 5);
        assert_eq!(agg.total(), 0);
        assert!(agg.actors.is_empty());
    }

    #[test]
    fn test_aggregate_window_filters_store() {
        let store = MemoryStore::new();
        let now = utc(2023, 10, 10, 12, 0);
        store
            .append_if_absent(&[
                event("alice", utc(2023, 10, 10, 9, 0)),
                event("bob", utc(2023, 10, 9, 9, 0)),
                event("alice", utc(2023, 9, 1, 9, 0)),
            ])
            .unwrap();

        let agg = aggregate_window(
            &store,
            &AggregateQuery::new(7),
            &AggregateConfig::default(),
            &now,
        )
        .unwrap();
        assert_eq!(agg.events.len(), 2);
        assert_eq!(agg.events[0].actor, "alice");

        let mut query = AggregateQuery::new(7);
        query.actor = Some("bob".to_string());
        let agg = aggregate_window(&store, &query, &AggregateConfig::default(), &now).unwrap();
        assert_eq!(agg.actors.len(), 1);
        assert_eq!(agg.matrix[1][9], 1);
    }

    #[test]
    fn test_aggregate_window_rejects_bad_days() {
        let store = MemoryStore::new();
        let config = AggregateConfig::default();
        let now = Utc::now();

        for days in [0, config.max_days + 1] {
            let err = aggregate_window(&store, &AggregateQuery::new(days), &config, &now)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidQuery(_)));
        }
    }
}
