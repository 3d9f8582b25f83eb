//! GitHub public-events mapper
//!
//! Maps the JSON returned by `GET /users/{user}/events` into canonical
//! events. Only the event kinds with a natural code activity counterpart get
//! their own type; everything else becomes `code.other`.

use super::json::parse_document;
use crate::ingest::parser::{FormatParser, ParseResult};
use crate::ingest::timestamp::parse_flexible;
use crate::types::{event_type, Event, Source, UNKNOWN_ACTOR};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Snippets are clamped to this many characters.
pub const GITHUB_SNIPPET_LIMIT: usize = 300;

fn re_fix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)fix|bug").unwrap())
}

/// Parser for GitHub API event arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct GithubEventsParser;

fn text<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

impl GithubEventsParser {
    /// Map one API event; `None` when it lacks a usable `created_at`.
    pub fn map_event(raw: &Value) -> Option<Event> {
        let timestamp = raw
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(parse_flexible)?;
        let actor = raw
            .pointer("/actor/login")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ACTOR);
        let repo = text(raw, "/repo/name");
        let kind = text(raw, "/type");

        let mut tags: &[&str] = &[];
        let (event_type, snippet) = match kind {
            "PushEvent" => {
                let commits = raw
                    .pointer("/payload/commits")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let message = commits
                    .first()
                    .and_then(|c| c.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Pushed code");
                let snippet = format!(
                    "Pushed {} commits to {}: {}",
                    commits.len(),
                    repo,
                    message
                );
                tags = if re_fix().is_match(&snippet) {
                    &["bugfix"]
                } else {
                    &["feature"]
                };
                (event_type::COMMIT, snippet)
            }
            "PullRequestEvent" => (
                event_type::PULL_REQUEST,
                format!(
                    "{} PR in {}: {}",
                    text(raw, "/payload/action"),
                    repo,
                    text(raw, "/payload/pull_request/title")
                ),
            ),
            "IssuesEvent" => (
                event_type::ISSUE,
                format!(
                    "{} issue in {}: {}",
                    text(raw, "/payload/action"),
                    repo,
                    text(raw, "/payload/issue/title")
                ),
            ),
            "CreateEvent" => (
                event_type::CREATE,
                format!("Created {} in {}", text(raw, "/payload/ref_type"), repo),
            ),
            other => (event_type::CODE_OTHER, format!("{} in {}", other, repo)),
        };

        Some(Event::new(
            Source::GithubApi,
            timestamp,
            actor,
            event_type,
            tags,
            &snippet,
            GITHUB_SNIPPET_LIMIT,
        ))
    }
}

impl FormatParser for GithubEventsParser {
    fn source(&self) -> Source {
        Source::GithubApi
    }

    fn parse(&self, text: &str) -> ParseResult {
        let mut result = ParseResult::default();

        let Some(Value::Array(items)) = parse_document(text) else {
            return result;
        };

        for item in &items {
            match Self::map_event(item) {
                Some(event) => result.events.push(event),
                None => result.skipped += 1,
            }
        }

        tracing::debug!(
            events = result.events.len(),
            skipped = result.skipped,
            "Mapped GitHub events"
        );
        result
    }
}
