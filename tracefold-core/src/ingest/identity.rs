//! Event identity and content normalization
//!
//! Every event id is the hex SHA-256 of `source|timestamp|actor|content`,
//! where `timestamp` is the canonical millisecond UTC string and `content`
//! is the already-clamped snippet. Identical input therefore always maps
//! to the same id, and the store's primary key turns re-ingestion into a
//! no-op.

use crate::types::Source;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Canonical ISO-8601 UTC rendering, e.g. `2023-10-01T10:00:00.000Z`.
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Content-derived id for an event.
pub fn event_id(source: Source, ts: &DateTime<Utc>, actor: &str, content: &str) -> String {
    hash_fields(&[source.as_str(), &iso_timestamp(ts), actor, content])
}

/// Hex SHA-256 of the fields joined with `|`.
pub fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Truncate to at most `limit` characters without splitting a code point.
pub fn clamp_snippet(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso_timestamp_has_millis_and_z() {
        let ts = Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap();
        assert_eq!(iso_timestamp(&ts), "2023-10-01T10:00:00.000Z");
    }

    #[test]
    fn test_event_id_is_deterministic() {
        let ts = Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap();
        let a = event_id(Source::Git, &ts, "Alice", "Fix bug");
        let b = event_id(Source::Git, &ts, "Alice", "Fix bug");
        let c = event_id(Source::Git, &ts, "Alice", "Fix bugs");
        let d = event_id(Source::Slack, &ts, "Alice", "Fix bug");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
        assert_eq!(
            a,
            hash_fields(&["git", "2023-10-01T10:00:00.000Z", "Alice", "Fix bug"])
        );
    }

    #[test]
    fn test_clamp_snippet_respects_char_boundaries() {
        assert_eq!(clamp_snippet("hello", 10), "hello");
        assert_eq!(clamp_snippet("hello", 3), "hel");
        assert_eq!(clamp_snippet("héllo wörld", 4), "héll");
        assert_eq!(clamp_snippet("🎉🎉🎉", 2), "🎉🎉");
        assert_eq!(clamp_snippet("", 5), "");
    }
}
