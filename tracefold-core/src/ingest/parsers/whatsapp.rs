//! Chat-export (WhatsApp-style) text parser
//!
//! Each message starts with a header line:
//!
//! ```text
//! 12/05/2023, 21:03 - Alice: Message text
//! 5/12/23, 9:03 PM - Bob: Another message
//! ```
//!
//! Lines without a header continue the previous message. Parsing is a fold
//! over the lines carrying the currently open message; a message becomes an
//! [`Event`] (and gets its id) only once the next header or the end of the
//! document closes it, so multi-line messages hash over their full text.
//!
//! Dates are read month/day/year first and retried as day/month/year, since
//! exports do not say which locale wrote them. Times are local wall-clock.

use crate::ingest::parser::{content_lines, FormatParser, ParseResult};
use crate::ingest::timestamp::resolve_local;
use crate::types::{event_type, Event, Source};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Message snippets are clamped to this many characters.
pub const CHAT_SNIPPET_LIMIT: usize = 300;

/// Each continuation line contributes at most this many characters.
pub const CONTINUATION_LIMIT: usize = 200;

fn re_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\d{1,2})/(\d{1,2})/(\d{2,4}),?\s+(\d{1,2}):(\d{2})(?:\s?([APMapm]{2}))?\s+-\s+([^:]+):\s+(.*)$",
        )
        .unwrap()
    })
}

fn re_study() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)study|session|exam|revision|homework").unwrap())
}

/// Parser for WhatsApp-style `.txt` chat exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatsAppParser;

/// A header line that resolved to a valid instant.
struct Header<'a> {
    timestamp: DateTime<Utc>,
    sender: &'a str,
    message: &'a str,
}

/// Message whose continuation lines may still arrive.
struct OpenMessage {
    timestamp: DateTime<Utc>,
    sender: String,
    text: String,
}

impl OpenMessage {
    fn append(&mut self, line: &str) {
        // 4 bytes per char at most, so past this length the snippet is full.
        if self.text.len() >= CHAT_SNIPPET_LIMIT * 4 {
            return;
        }
        let piece: String = line.chars().take(CONTINUATION_LIMIT).collect();
        self.text.push(' ');
        self.text.push_str(&piece);
    }

    fn close(self) -> Event {
        let tags: &[&str] = if re_study().is_match(&self.text) {
            &["study"]
        } else {
            &[]
        };
        Event::new(
            Source::WhatsApp,
            self.timestamp,
            &self.sender,
            event_type::CHAT_MESSAGE,
            tags,
            &self.text,
            CHAT_SNIPPET_LIMIT,
        )
    }
}

/// Fold accumulator: closed events plus the message still being assembled.
#[derive(Default)]
struct ChatFold {
    result: ParseResult,
    open: Option<OpenMessage>,
}

impl ChatFold {
    fn step(mut self, line: &str) -> Self {
        match WhatsAppParser::parse_header(line) {
            Some(header) => {
                if let Some(done) = self.open.take() {
                    self.result.events.push(done.close());
                }
                self.open = Some(OpenMessage {
                    timestamp: header.timestamp,
                    sender: header.sender.trim().to_string(),
                    text: header.message.to_string(),
                });
            }
            None => match self.open.as_mut() {
                Some(open) => open.append(line),
                None => self.result.skipped += 1,
            },
        }
        self
    }

    fn finish(mut self) -> ParseResult {
        if let Some(done) = self.open.take() {
            self.result.events.push(done.close());
        }
        self.result
    }
}

impl WhatsAppParser {
    /// Match a header line and resolve its timestamp.
    ///
    /// Returns `None` for non-headers and for headers whose date is invalid
    /// in both orders; the caller treats both as continuation text.
    fn parse_header(line: &str) -> Option<Header<'_>> {
        let caps = re_header().captures(line)?;
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = expand_year(caps[3].parse().ok()?, caps[3].len());
        let time = parse_clock(
            caps[4].parse().ok()?,
            caps[5].parse().ok()?,
            caps.get(6).map(|m| m.as_str()),
        )?;

        let date = NaiveDate::from_ymd_opt(year, first, second)
            .or_else(|| NaiveDate::from_ymd_opt(year, second, first))?;
        let timestamp = resolve_local(date.and_time(time))?;

        Some(Header {
            timestamp,
            sender: caps.get(7)?.as_str(),
            message: caps.get(8)?.as_str(),
        })
    }
}

/// Two-digit years pivot at 50: `23` is 2023, `87` is 1987.
fn expand_year(year: i32, digits: usize) -> i32 {
    if digits <= 2 {
        if year < 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

/// 24-hour clock unless an AM/PM marker is present (then hours 1-12).
fn parse_clock(hour: u32, minute: u32, meridiem: Option<&str>) -> Option<NaiveTime> {
    let hour = match meridiem.map(str::to_ascii_uppercase).as_deref() {
        None => hour,
        Some("AM") if (1..=12).contains(&hour) => hour % 12,
        Some("PM") if (1..=12).contains(&hour) => hour % 12 + 12,
        Some(_) => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

impl FormatParser for WhatsAppParser {
    fn source(&self) -> Source {
        Source::WhatsApp
    }

    fn parse(&self, text: &str) -> ParseResult {
        let result = content_lines(text)
            .fold(ChatFold::default(), ChatFold::step)
            .finish();

        tracing::debug!(
            events = result.events.len(),
            skipped = result.skipped,
            "Parsed chat export"
        );
        result
    }
}
