//! Format detection
//!
//! Classification is a chain of cheap signature checks, tried in a fixed
//! order; the first match wins:
//!
//! 1. JSON with a `messages` array and a `name` → Telegram
//! 2. JSON array whose first record has `ts` and `user` → Slack
//! 3. JSON array (or `messages` array) whose first record has `timestamp`
//!    and `author` → Discord
//! 4. `BEGIN:VCALENDAR` anywhere → iCalendar
//! 5. first 20 lines look like `date ... - Name: text` → WhatsApp
//! 6. first 20 lines contain a hex revision or a `|` → git
//!
//! When no signature matches, the git parser and then the chat parser are
//! tried on the whole document, and the first that yields events wins
//! (`git_fallback` / `whatsapp_fallback`). Otherwise the document is `raw`.

use super::parser::FormatParser;
use super::parsers::json::{is_truthy, parse_document};
use super::parsers::{DiscordParser, GitLogParser, WhatsAppParser};
use crate::types::DetectedFormat;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Lines inspected by the text signatures.
pub const SAMPLE_LINES: usize = 20;

fn re_chat_sender() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\s+[^:]+:\s+").unwrap())
}

fn re_chat_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{2,4}").unwrap())
}

fn re_revision() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[0-9a-f]{7,40}\b").unwrap())
}

/// Classify a document by signature alone (steps 1–6).
///
/// Returns `None` when only a parse attempt can decide.
pub fn detect_signature(text: &str) -> Option<DetectedFormat> {
    sniff_json(text)
        .or_else(|| sniff_calendar(text))
        .or_else(|| {
            let sample = sample(text);
            sniff_whatsapp(&sample).or_else(|| sniff_git(&sample))
        })
}

/// Full classification, including the parse-based fallbacks.
///
/// The ingest pipeline reuses the fallback parses instead of calling this;
/// this entry point is for callers that only want the tag.
pub fn detect(text: &str) -> DetectedFormat {
    if let Some(format) = detect_signature(text) {
        return format;
    }
    if !GitLogParser.parse(text).is_empty() {
        return DetectedFormat::GitFallback;
    }
    if !WhatsAppParser.parse(text).is_empty() {
        return DetectedFormat::WhatsAppFallback;
    }
    DetectedFormat::Raw
}

/// JSON signatures. Only attempted when the text looks like JSON; a parse
/// failure is simply no match.
pub fn sniff_json(text: &str) -> Option<DetectedFormat> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    let doc = parse_document(text)?;

    let has_messages = doc.get("messages").map(Value::is_array).unwrap_or(false);
    if has_messages && is_truthy(doc.get("name")) {
        return Some(DetectedFormat::Telegram);
    }

    if let Some(first) = doc.as_array().and_then(|items| items.first()) {
        if is_truthy(first.get("ts")) && is_truthy(first.get("user")) {
            return Some(DetectedFormat::Slack);
        }
    }

    let first = DiscordParser::messages(&doc).and_then(|items| items.first())?;
    if is_truthy(first.get("timestamp")) && is_truthy(first.get("author")) {
        return Some(DetectedFormat::Discord);
    }

    None
}

/// iCalendar signature.
pub fn sniff_calendar(text: &str) -> Option<DetectedFormat> {
    text.contains("BEGIN:VCALENDAR")
        .then_some(DetectedFormat::Calendar)
}

/// WhatsApp signature over the line sample.
pub fn sniff_whatsapp(sample: &str) -> Option<DetectedFormat> {
    (re_chat_sender().is_match(sample) && re_chat_date().is_match(sample))
        .then_some(DetectedFormat::WhatsApp)
}

/// Git signature over the line sample.
pub fn sniff_git(sample: &str) -> Option<DetectedFormat> {
    (re_revision().is_match(sample) || sample.contains('|')).then_some(DetectedFormat::Git)
}

/// First [`SAMPLE_LINES`] lines, rejoined with `\n`.
fn sample(text: &str) -> String {
    text.lines()
        .take(SAMPLE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_beats_discord() {
        let doc = r#"{"name": "Chat", "messages": [{"timestamp": "2023-10-01T10:00:00Z", "author": "a"}]}"#;
        assert_eq!(detect(doc), DetectedFormat::Telegram);
    }

    #[test]
    fn test_telegram_needs_truthy_name() {
        let doc = r#"{"name": "", "messages": [{"timestamp": "2023-10-01T10:00:00Z", "author": {"name": "a"}}]}"#;
        assert_eq!(detect(doc), DetectedFormat::Discord);
    }

    #[test]
    fn test_slack() {
        let doc = r#"[{"ts": "1696154400.0002", "user": "U1", "text": "hi"}]"#;
        assert_eq!(detect(doc), DetectedFormat::Slack);
    }

    #[test]
    fn test_slack_requires_truthy_fields() {
        let doc = r#"[{"ts": "", "user": "U1"}]"#;
        assert_ne!(sniff_json(doc), Some(DetectedFormat::Slack));
    }

    #[test]
    fn test_discord_array_and_nested() {
        let array = r#"[{"timestamp": "2023-10-01T10:00:00Z", "author": {"name": "a"}}]"#;
        let nested = r#"{"messages": [{"timestamp": "2023-10-01T10:00:00Z", "author": {"name": "a"}}]}"#;
        assert_eq!(detect(array), DetectedFormat::Discord);
        assert_eq!(detect(nested), DetectedFormat::Discord);
    }

    #[test]
    fn test_broken_json_falls_through() {
        assert_eq!(sniff_json("{\"messages\": [}"), None);
        assert_eq!(sniff_json("[]"), None);
        assert_eq!(sniff_json("plain text"), None);
    }

    #[test]
    fn test_calendar() {
        let doc = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20231001T100000Z\nEND:VEVENT\nEND:VCALENDAR";
        assert_eq!(detect(doc), DetectedFormat::Calendar);
    }

    #[test]
    fn test_whatsapp_beats_git() {
        let doc = "12/05/2023, 21:03 - Alice: commit deadbeef pushed | ok";
        assert_eq!(detect(doc), DetectedFormat::WhatsApp);
    }

    #[test]
    fn test_git_signature() {
        assert_eq!(
            detect("abc1234|Alice|2023-10-01T10:00:00Z|Init"),
            DetectedFormat::Git
        );
        assert_eq!(detect("see revision 0a1b2c3d"), DetectedFormat::Git);
    }

    #[test]
    fn test_signature_only_sees_first_20_lines() {
        let mut doc = "hello world\n".repeat(SAMPLE_LINES);
        doc.push_str("a|b|c\n");
        assert_eq!(detect_signature(&doc), None);
        assert_eq!(detect(&doc), DetectedFormat::Raw);
    }

    #[test]
    fn test_git_fallback() {
        let mut doc = "notes from the week\n".repeat(SAMPLE_LINES);
        doc.push_str("abc1234|Alice|2023-10-01T10:00:00Z|Fix crash\n");
        assert_eq!(detect_signature(&doc), None);
        assert_eq!(detect(&doc), DetectedFormat::GitFallback);
    }

    #[test]
    fn test_whatsapp_fallback() {
        let mut doc = "notes from the week\n".repeat(SAMPLE_LINES);
        doc.push_str("12/05/2023, 21:03 - Alice: hello\n");
        assert_eq!(detect_signature(&doc), None);
        assert_eq!(detect(&doc), DetectedFormat::WhatsAppFallback);
    }

    #[test]
    fn test_raw() {
        assert_eq!(detect("Just a shopping list"), DetectedFormat::Raw);
    }
}
