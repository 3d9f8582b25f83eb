//! Version-control log parser
//!
//! Parses one commit per line in the shape produced by
//! `git log --pretty=format:'%h|%an|%aI|%s'`:
//!
//! ```text
//! abc1234|Alice|2023-10-01T10:00:00Z|Fix login redirect
//! ```
//!
//! Fields beyond the third are re-joined with `|`, so pipes inside commit
//! messages survive. Lines whose pipe-split timestamp does not parse get a
//! second chance through a looser `<hash> | author | timestamp | message`
//! pattern; anything else is dropped.

use crate::ingest::parser::{content_lines, FormatParser, ParseResult};
use crate::ingest::timestamp::parse_flexible;
use crate::types::{event_type, Event, Source};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Commit messages are clamped to this many characters.
pub const GIT_SNIPPET_LIMIT: usize = 200;

fn re_commit_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([0-9a-f]{7,40})\s+\|\s*(.+?)\s*\|\s*(.+?)\s*\|\s*(.*)").unwrap()
    })
}

fn re_bugfix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)fix|bug|bugfix|hotfix").unwrap())
}

/// Parser for pipe-delimited commit logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitLogParser;

/// Fields extracted from one commit line.
struct CommitLine<'a> {
    author: &'a str,
    timestamp: DateTime<Utc>,
    message: String,
}

impl GitLogParser {
    /// Split on `|`: `(revision, author, timestamp, message...)`.
    fn parse_piped(line: &str) -> Option<CommitLine<'_>> {
        if !line.contains('|') {
            return None;
        }
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 3 {
            return None;
        }
        let timestamp = parse_flexible(fields[2])?;
        Some(CommitLine {
            author: fields[1],
            timestamp,
            message: fields[3..].join("|"),
        })
    }

    /// Looser pattern tolerant of text around the revision and delimiters.
    fn parse_pattern(line: &str) -> Option<CommitLine<'_>> {
        let caps = re_commit_line().captures(line)?;
        let author = caps.get(2)?.as_str();
        let timestamp = parse_flexible(caps.get(3)?.as_str())?;
        let message = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
        Some(CommitLine {
            author,
            timestamp,
            message: message.to_string(),
        })
    }

    /// Heuristic tag for a commit message.
    pub fn tag_for(message: &str) -> &'static str {
        if re_bugfix().is_match(message) {
            "bugfix"
        } else {
            "feature"
        }
    }
}

impl FormatParser for GitLogParser {
    fn source(&self) -> Source {
        Source::Git
    }

    fn parse(&self, text: &str) -> ParseResult {
        let mut result = ParseResult::default();

        for line in content_lines(text) {
            let Some(commit) = Self::parse_piped(line).or_else(|| Self::parse_pattern(line))
            else {
                result.skipped += 1;
                continue;
            };

            result.events.push(Event::new(
                Source::Git,
                commit.timestamp,
                commit.author,
                event_type::COMMIT,
                &[Self::tag_for(&commit.message)],
                &commit.message,
                GIT_SNIPPET_LIMIT,
            ));
        }

        tracing::debug!(
            events = result.events.len(),
            skipped = result.skipped,
            "Parsed git log"
        );
        result
    }
}
