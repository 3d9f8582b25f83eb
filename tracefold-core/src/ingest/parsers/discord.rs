//! Discord chat export parser
//!
//! Reads DiscordChatExporter JSON, either a bare array of messages or an
//! object with a `messages` array. Author objects carry `name` and/or
//! `username`; some exporters write the author as a plain string.

use super::json::{first_text, parse_document};
use crate::ingest::parser::{FormatParser, ParseResult};
use crate::ingest::timestamp::parse_flexible;
use crate::types::{event_type, Event, Source, UNKNOWN_ACTOR};
use serde_json::Value;

/// Message snippets are clamped to this many characters.
pub const DISCORD_SNIPPET_LIMIT: usize = 300;

/// Parser for Discord channel exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscordParser;

impl DiscordParser {
    /// Message list from either accepted document shape.
    pub(crate) fn messages(doc: &Value) -> Option<&Vec<Value>> {
        match doc {
            Value::Array(items) => Some(items),
            Value::Object(obj) => obj.get("messages").and_then(Value::as_array),
            _ => None,
        }
    }

    fn resolve_actor(author: &Value) -> String {
        first_text(&[author.get("name"), author.get("username")])
            .or_else(|| author.as_str().filter(|s| !s.is_empty()).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string())
    }

    fn parse_message(msg: &Value) -> Option<Event> {
        let date = first_text(&[msg.get("timestamp"), msg.get("date")])?;
        let author = msg.get("author").filter(|a| !a.is_null())?;
        let timestamp = parse_flexible(&date)?;
        let content = msg.get("content").and_then(Value::as_str).unwrap_or_default();

        Some(Event::new(
            Source::Discord,
            timestamp,
            &Self::resolve_actor(author),
            event_type::CHAT_MESSAGE,
            &[],
            content,
            DISCORD_SNIPPET_LIMIT,
        ))
    }
}

impl FormatParser for DiscordParser {
    fn source(&self) -> Source {
        Source::Discord
    }

    fn parse(&self, text: &str) -> ParseResult {
        let mut result = ParseResult::default();

        let Some(doc) = parse_document(text) else {
            return result;
        };
        let Some(messages) = Self::messages(&doc) else {
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
            "Parsed Discord export"
        );
        result
    }
}
