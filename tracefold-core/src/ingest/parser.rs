//! Parser trait abstraction
//!
//! All format parsers implement the [`FormatParser`] trait to provide a
//! unified interface from document text to canonical events.
//!
//! ## Design Principles
//!
//! 1. **Pure**: a parser sees only the document text; no store, no clock
//! 2. **Resilience**: malformed lines and records are skipped and counted, never raised
//! 3. **Ordered**: output order matches input line/record order
//! 4. **Extensible**: new formats only require implementing this trait

use crate::types::{Event, Source};

/// Result of parsing one document.
#[derive(Debug, Default, Clone)]
pub struct ParseResult {
    /// Events in input order
    pub events: Vec<Event>,
    /// Lines or records that were dropped (malformed shape or invalid timestamp)
    pub skipped: usize,
}

impl ParseResult {
    /// Number of events produced
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events were produced
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Trait implemented by all format parsers.
///
/// ## Example
///
/// ```rust
/// use tracefold_core::ingest::FormatParser;
/// use tracefold_core::ingest::parsers::GitLogParser;
///
/// let result = GitLogParser.parse("abc1234|Alice|2023-10-01T10:00:00Z|Fix bug");
/// assert_eq!(result.events.len(), 1);
/// ```
pub trait FormatParser: Send + Sync {
    /// Source stamped on every event this parser produces
    fn source(&self) -> Source;

    /// Parse a whole document.
    ///
    /// ## Error Handling
    ///
    /// Never fails. Unparseable lines, records and timestamps are dropped
    /// and counted in [`ParseResult::skipped`]; a document that is not in
    /// this parser's format at all yields an empty result.
    fn parse(&self, text: &str) -> ParseResult;
}

/// Split a document into trimmed, non-empty lines.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}
