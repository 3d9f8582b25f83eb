//! Telegram Desktop export parser
//!
//! Telegram writes a `result.json` per chat:
//!
//! ```json
//! {"name": "Study group", "type": "private_group", "messages": [
//!   {"id": 1, "type": "message", "date": "2023-10-01T10:00:00",
//!    "date_unixtime": "1696154400", "from": "Alice",
//!    "text": ["see ", {"type": "link", "text": "https://example.com"}]}
//! ]}
//! ```
//!
//! `date` is wall-clock time in the exporting machine's zone; `text` is a
//! plain string or an array of string and entity segments.

use super::json::{first_text, is_truthy, parse_document};
use crate::ingest::parser::{FormatParser, ParseResult};
use crate::ingest::timestamp::{from_epoch_seconds, parse_flexible};
use crate::types::{event_type, Event, Source, UNKNOWN_ACTOR};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Message snippets are clamped to this many characters.
pub const TELEGRAM_SNIPPET_LIMIT: usize = 300;

/// Parser for Telegram chat exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramParser;

impl TelegramParser {
    /// Flatten a `text` field into plain text.
    fn flatten_text(text: &Value) -> String {
        match text {
            Value::String(s) => s.clone(),
            Value::Array(segments) => segments
                .iter()
                .filter_map(|seg| match seg {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect(),
            _ => String::new(),
        }
    }

    fn parse_date(msg: &Value) -> Option<DateTime<Utc>> {
        let from_date = msg
            .get("date")
            .and_then(Value::as_str)
            .and_then(parse_flexible);
        if from_date.is_some() {
            return from_date;
        }
        let secs = match msg.get("date_unixtime")? {
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            Value::Number(n) => n.as_f64()?,
            _ => return None,
        };
        from_epoch_seconds(secs)
    }

    fn parse_message(msg: &Value) -> Option<Event> {
        if msg.get("type").and_then(Value::as_str) != Some("message")
            || !is_truthy(msg.get("date"))
            || !is_truthy(msg.get("text"))
        {
            return None;
        }
        let timestamp = Self::parse_date(msg)?;
        let content = Self::flatten_text(msg.get("text")?);
        let actor =
            first_text(&[msg.get("from")]).unwrap_or_else(|| UNKNOWN_ACTOR.to_string());

        Some(Event::new(
            Source::Telegram,
            timestamp,
            &actor,
            event_type::CHAT_MESSAGE,
            &[],
            &content,
            TELEGRAM_SNIPPET_LIMIT,
        ))
    }
}

impl FormatParser for TelegramParser {
    fn source(&self) -> Source {
        Source::Telegram
    }

    fn parse(&self, text: &str) -> ParseResult {
        let mut result = ParseResult::default();

        let Some(doc) = parse_document(text) else {
            return result;
        };
        let Some(messages) = doc.get("messages").and_then(Value::as_array) else {
            return result;
        };

        for msg in messages {
            match Self::parse_message(msg) {
                Some(event) => result.events.push(event),
                None => result.skipped += 1,
            }
        }

        tracing::debug!(
            events = result.events.len(),
            skipped = result.skipped,
            "Parsed Telegram export"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone, Timelike};

    #[test]
    fn test_parse_plain_and_segmented_text() {
        let input = r#"{"name": "Study group", "messages": [
            {"type": "message", "date": "2023-10-01T10:00:00", "from": "Alice", "text": "hello"},
            {"type": "message", "date": "2023-10-01T10:01:00", "from": "Bob",
             "text": ["see ", {"type": "link", "text": "https://example.com"}, "!"]}
        ]}"#;
        let result = TelegramParser.parse(input);

        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].actor, "Alice");
        assert_eq!(result.events[0].source, Source::Telegram);
        assert_eq!(
            result.events[1].content_snippet,
            "see https://example.com!"
        );

        let local = result.events[0].timestamp.with_timezone(&Local);
        assert_eq!(local.hour(), 10);
    }

    #[test]
    fn test_service_messages_are_skipped() {
        let input = r#"{"name": "g", "messages": [
            {"type": "service", "date": "2023-10-01T10:00:00", "action": "create_group", "text": ""},
            {"type": "message", "date": "2023-10-01T10:00:00", "from": "A", "text": ""},
            {"type": "message", "date": "2023-10-01T10:00:00", "from": null, "text": "anon"}
        ]}"#;
        let result = TelegramParser.parse(input);

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].actor, UNKNOWN_ACTOR);
        assert_eq!(result.skipped, 2);
    }

    #[test]
    fn test_unixtime_fallback() {
        let input = r#"{"name": "g", "messages": [
            {"type": "message", "date": "garbled", "date_unixtime": "1696154400",
             "from": "A", "text": "hi"}
        ]}"#;
        let result = TelegramParser.parse(input);

        assert_eq!(result.events.len(), 1);
        assert_eq!(
            result.events[0].timestamp,
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_json_is_empty() {
        assert!(TelegramParser.parse("{\"messages\": [").is_empty());
        assert!(TelegramParser.parse("[]").is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(TelegramParser.parse("").is_empty());
    }
}
