//! Activity summary: hourly profile, source mix, peak hour and streaks.
//!
//! Computed from an [`Aggregate`], so it always agrees with the heatmap for
//! the same window.

use crate::types::{Aggregate, Source, HOURS_PER_DAY};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::HashMap;

/// Events from one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: Source,
    pub count: u64,
}

/// Summary statistics for one aggregation window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivitySummary {
    /// Events counted in the matrix
    pub total_events: u64,
    /// Days in the window
    pub days: usize,
    /// Days with at least one event
    pub active_days: usize,
    /// Events per local hour, summed over the window
    pub hourly: [u64; HOURS_PER_DAY],
    /// Events per source, most frequent first
    pub sources: Vec<SourceCount>,

    // Patterns
    /// Hour with the most events (earliest on ties); `None` without events
    pub peak_hour: Option<u8>,
    /// Weekday with the most events (earliest in the week on ties)
    pub busiest_day: Option<Weekday>,

    // Streaks
    /// Consecutive active days ending today
    pub current_streak: usize,
    /// Longest run of consecutive active days in the window
    pub longest_streak: usize,
}

impl ActivitySummary {
    /// Summarize an aggregate whose row 0 is `today`.
    pub fn from_aggregate(aggregate: &Aggregate, today: NaiveDate) -> Self {
        let daily = aggregate.daily_totals();
        let total_events: u64 = daily.iter().sum();

        let mut hourly = [0u64; HOURS_PER_DAY];
        for row in &aggregate.matrix {
            for (hour, &count) in row.iter().enumerate() {
                hourly[hour] += count as u64;
            }
        }

        let mut by_weekday = [0u64; 7];
        for (delta, &count) in daily.iter().enumerate() {
            let date = today - Duration::days(delta as i64);
            by_weekday[date.weekday().num_days_from_monday() as usize] += count;
        }

        // Oldest first for the streak scan
        let oldest_first: Vec<u64> = daily.iter().rev().copied().collect();
        let (current_streak, longest_streak) = Self::calculate_streaks(&oldest_first);

        Self {
            total_events,
            days: aggregate.days(),
            active_days: daily.iter().filter(|&&c| c > 0).count(),
            hourly,
            sources: Self::count_sources(aggregate),
            peak_hour: argmax(&hourly).map(|h| h as u8),
            busiest_day: argmax(&by_weekday).map(|d| weekday_from_monday(d as u8)),
            current_streak,
            longest_streak,
        }
    }

    /// Calculate streaks from daily activity, oldest day first.
    /// Returns (current_streak, longest_streak).
    pub fn calculate_streaks(daily_activity: &[u64]) -> (usize, usize) {
        let mut longest_streak = 0;
        let mut streak = 0;

        for &count in daily_activity {
            if count > 0 {
                streak += 1;
                longest_streak = longest_streak.max(streak);
            } else {
                streak = 0;
            }
        }

        // Current streak includes the last day; count backwards from it
        let current_streak = daily_activity
            .iter()
            .rev()
            .take_while(|&&count| count > 0)
            .count();

        (current_streak, longest_streak)
    }

    fn count_sources(aggregate: &Aggregate) -> Vec<SourceCount> {
        let mut counts: HashMap<Source, u64> = HashMap::new();
        for event in &aggregate.events {
            *counts.entry(event.source).or_default() += 1;
        }
        let mut sources: Vec<SourceCount> = counts
            .into_iter()
            .map(|(source, count)| SourceCount { source, count })
            .collect();
        sources.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source.as_str().cmp(b.source.as_str()))
        });
        sources
    }

    /// Format the peak hour for display (e.g., "2-3pm").
    pub fn format_peak_hour(&self) -> Option<String> {
        let hour = self.peak_hour? as u32;
        let next_hour = (hour + 1) % 24;

        let format_hour = |h: u32| -> String {
            match h {
                0 => "12am".to_string(),
                1..=11 => format!("{}am", h),
                12 => "12pm".to_string(),
                _ => format!("{}pm", h - 12),
            }
        };

        Some(format!("{}-{}", format_hour(hour), format_hour(next_hour)))
    }

    /// Share of days with activity, in percent.
    pub fn activity_percentage(&self) -> f64 {
        if self.days == 0 {
            0.0
        } else {
            (self.active_days as f64 / self.days as f64) * 100.0
        }
    }
}

/// Index of the largest non-zero value, earliest on ties.
fn argmax(values: &[u64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > 0)
        .fold(None, |best: Option<(usize, u64)>, (i, &v)| match best {
            Some((_, max)) if max >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn weekday_from_monday(day: u8) -> Weekday {
    Weekday::try_from(day).unwrap_or(Weekday::Mon)
}
