//! Timestamp canonicalization
//!
//! Exports carry timestamps in many shapes. Everything is normalized to
//! `DateTime<Utc>` here; zone-less wall-clock values are read in the host's
//! local time zone, which matches how chat clients write them.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Formats carrying an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    // git log --date=iso
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%z",
    // git log default
    "%a %b %e %H:%M:%S %Y %z",
];

/// Zone-less formats, interpreted as local time.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a free-form timestamp.
///
/// Accepts RFC 3339, RFC 2822, the git date formats, zone-less date-times
/// (local time) and bare `YYYY-MM-DD` dates (UTC midnight). Returns `None`
/// for anything else.
pub fn parse_flexible(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return resolve_local(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

/// Interpret a wall-clock time in the local time zone.
pub fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    resolve_in(&Local, naive)
}

/// Interpret a wall-clock time in `tz`.
///
/// Ambiguous times resolve to the earlier instant. Times inside a DST gap
/// do not exist locally and are shifted forward by an hour, so `02:30` on a
/// spring-forward night becomes `03:30` daylight time.
pub fn resolve_in<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Epoch seconds with an optional fractional part (Slack `ts` values).
///
/// Sub-millisecond precision is truncated.
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).trunc();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}
