//! Slack channel export parser
//!
//! A Slack export holds one JSON file per channel and day, each an array of
//! message objects:
//!
//! ```json
//! [{"ts": "1696154400.000200", "user": "U123", "text": "hi",
//!   "user_profile": {"real_name": "Alice"}}]
//! ```

use super::json::{first_text, is_truthy, parse_document};
use crate::ingest::parser::{FormatParser, ParseResult};
use crate::ingest::timestamp::from_epoch_seconds;
use crate::types::{event_type, Event, Source, UNKNOWN_ACTOR};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Message snippets are clamped to this many characters.
pub const SLACK_SNIPPET_LIMIT: usize = 300;

/// Parser for Slack channel exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlackParser;

impl SlackParser {
    /// Slack `ts` is epoch seconds with a sub-second suffix, as a string or number.
    fn parse_ts(value: &Value) -> Option<DateTime<Utc>> {
        let secs = match value {
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            Value::Number(n) => n.as_f64()?,
            _ => return None,
        };
        from_epoch_seconds(secs)
    }

    fn parse_message(msg: &Value) -> Option<Event> {
        if !is_truthy(msg.get("ts")) || !is_truthy(msg.get("user")) {
            return None;
        }
        let timestamp = Self::parse_ts(msg.get("ts")?)?;
        let actor = first_text(&[msg.pointer("/user_profile/real_name"), msg.get("user")])
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string());
        let content = msg.get("text").and_then(Value::as_str).unwrap_or_default();

        Some(Event::new(
            Source::Slack,
            timestamp,
            &actor,
            event_type::CHAT_MESSAGE,
            &[],
            content,
            SLACK_SNIPPET_LIMIT,
        ))
    }
}

impl FormatParser for SlackParser {
    fn source(&self) -> Source {
        Source::Slack
    }

    fn parse(&self, text: &str) -> ParseResult {
        let mut result = ParseResult::default();

        let Some(Value::Array(messages)) = parse_document(text) else {
            return result;
        };

        for msg in &messages {
            match Self::parse_message(msg) {
                Some(event) => result.events.push(event),
                None => result.skipped += 1,
            }
        }

        tracing::debug!(
            events = result.events.len(),
            skipped = result.skipped,
            "Parsed Slack export"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_messages() {
        let input = r#"[
            {"ts": "1696154400.000200", "user": "U123", "text": "Standup in 5",
             "user_profile": {"real_name": "Alice Smith"}},
            {"ts": 1696154460, "user": "U456", "text": "ok"}
        ]"#;
        let result = SlackParser.parse(input);

        assert_eq!(result.events.len(), 2);
        let first = &result.events[0];
        assert_eq!(first.source, Source::Slack);
        assert_eq!(first.actor, "Alice Smith");
        assert_eq!(first.content_snippet, "Standup in 5");
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap()
        );
        assert!(first.tags.is_empty());

        assert_eq!(result.events[1].actor, "U456");
    }

    #[test]
    fn test_records_without_ts_or_user_are_skipped() {
        let input = r#"[
            {"ts": "1696154400.0", "text": "bot message"},
            {"user": "U1", "text": "no ts"},
            {"ts": "not-a-number", "user": "U1", "text": "bad ts"},
            {"ts": "1696154400.0", "user": "U1"}
        ]"#;
        let result = SlackParser.parse(input);

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].content_snippet, "");
        assert_eq!(result.skipped, 3);
    }

    #[test]
    fn test_invalid_json_or_shape_is_empty() {
        assert!(SlackParser.parse("{not json").is_empty());
        assert!(SlackParser.parse(r#"{"messages": []}"#).is_empty());
        assert!(SlackParser.parse("").is_empty());
    }
}
