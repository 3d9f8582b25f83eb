//! iCalendar (RFC 5545) parser
//!
//! Only `VEVENT` blocks are read, and only their `DTSTART`, `SUMMARY` and
//! `DESCRIPTION` properties. Recurrence rules and time zone definitions are
//! ignored: `DTSTART` values are read as UTC.

use crate::ingest::parser::{FormatParser, ParseResult};
use crate::types::{event_type, Event, Source};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Event snippets are clamped to this many characters.
pub const ICS_SNIPPET_LIMIT: usize = 300;

/// Calendars are personal; every event belongs to the uploader.
pub const CALENDAR_ACTOR: &str = "me";

const UNTITLED: &str = "Untitled Event";

fn re_fold() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n[ \t]").unwrap())
}

fn re_vevent() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)BEGIN:VEVENT").unwrap())
}

fn re_dtstart() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^DTSTART(?:;[^:\r\n]*)?:(\S+)").unwrap())
}

fn re_summary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^SUMMARY(?:;[^:\r\n]*)?:(.*)$").unwrap())
}

fn re_description() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^DESCRIPTION(?:;[^:\r\n]*)?:(.*)$").unwrap()
    })
}

/// Parser for `.ics` calendar files.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcsParser;

impl IcsParser {
    /// Join folded continuation lines back onto their property line.
    fn unfold(text: &str) -> String {
        re_fold().replace_all(text, "").into_owned()
    }

    /// Read a `DTSTART` value: `YYYYMMDD` (all-day) or `YYYYMMDDTHHMMSS[Z]`.
    pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if value.len() == 8 {
            let date = Self::date_part(value)?;
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }

        let digits = value.replacen('T', "", 1).replacen('Z', "", 1);
        if digits.len() < 14 {
            return None;
        }
        let date = Self::date_part(&digits)?;
        let naive = date.and_hms_opt(
            Self::digits_at(&digits, 8..10)?,
            Self::digits_at(&digits, 10..12)?,
            Self::digits_at(&digits, 12..14)?,
        )?;
        Some(naive.and_utc())
    }

    fn date_part(digits: &str) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            Self::digits_at(digits, 0..4)? as i32,
            Self::digits_at(digits, 4..6)?,
            Self::digits_at(digits, 6..8)?,
        )
    }

    /// Fixed-width numeric field; `None` unless every byte is an ASCII digit.
    fn digits_at(s: &str, range: Range<usize>) -> Option<u32> {
        let part = s.get(range)?;
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    }

    fn property<'a>(re: &Regex, block: &'a str) -> Option<&'a str> {
        re.captures(block)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }

    fn parse_block(block: &str) -> Option<Event> {
        let dtstart = Self::property(re_dtstart(), block)?;
        let timestamp = Self::parse_date(dtstart)?;
        let summary = Self::property(re_summary(), block).unwrap_or(UNTITLED);
        let description = Self::property(re_description(), block).unwrap_or_default();
        let content = format!("{} - {}", summary, description);

        Some(Event::new(
            Source::Calendar,
            timestamp,
            CALENDAR_ACTOR,
            event_type::CALENDAR_EVENT,
            &["meeting"],
            &content,
            ICS_SNIPPET_LIMIT,
        ))
    }
}

impl FormatParser for IcsParser {
    fn source(&self) -> Source {
        Source::Calendar
    }

    fn parse(&self, text: &str) -> ParseResult {
        let mut result = ParseResult::default();
        let unfolded = Self::unfold(text);

        // Everything before the first VEVENT is calendar header.
        for block in re_vevent().split(&unfolded).skip(1) {
            match Self::parse_block(block) {
                Some(event) => result.events.push(event),
                None => result.skipped += 1,
            }
        }

        tracing::debug!(
            events = result.events.len(),
            skipped = result.skipped,
            "Parsed calendar"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CALENDAR: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Example//EN\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20231001T100000Z\r\n\
SUMMARY:Team Sync\r\n\
DESCRIPTION:Weekly planning\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20231002\r\n\
SUMMARY:Offsite\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_timed_and_all_day_events() {
        let result = IcsParser.parse(CALENDAR);

        assert_eq!(result.events.len(), 2);
        let sync = &result.events[0];
        assert_eq!(sync.source, Source::Calendar);
        assert_eq!(sync.actor, "me");
        assert_eq!(sync.event_type, event_type::CALENDAR_EVENT);
        assert!(sync.has_tag("meeting"));
        assert_eq!(sync.content_snippet, "Team Sync - Weekly planning");
        assert_eq!(
            sync.timestamp,
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap()
        );

        let offsite = &result.events[1];
        assert_eq!(offsite.content_snippet, "Offsite - ");
        assert_eq!(
            offsite.timestamp,
            Utc.with_ymd_and_hms(2023, 10, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_summary_and_folded_lines() {
        let input = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20231001T090000\n\
DESCRIPTION:first half\n  second half\nEND:VEVENT\nEND:VCALENDAR\n";
        let result = IcsParser.parse(input);

        assert_eq!(result.events.len(), 1);
        assert_eq!(
            result.events[0].content_snippet,
            "Untitled Event - first half second half"
        );
    }

    #[test]
    fn test_tzid_parameter_is_accepted() {
        let input = "BEGIN:VEVENT\nDTSTART;TZID=Europe/Berlin:20231001T090000\nSUMMARY:Call\nEND:VEVENT\n";
        let result = IcsParser.parse(input);

        assert_eq!(result.events.len(), 1);
        assert_eq!(
            result.events[0].timestamp,
            Utc.with_ymd_and_hms(2023, 10, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unusable_dtstart_drops_block() {
        let input = "BEGIN:VEVENT\nSUMMARY:No start\nEND:VEVENT\n\
BEGIN:VEVENT\nDTSTART:2023\nSUMMARY:Short\nEND:VEVENT\n\
BEGIN:VEVENT\nDTSTART:20231301T000000Z\nSUMMARY:Month 13\nEND:VEVENT\n";
        let result = IcsParser.parse(input);

        assert!(result.events.is_empty());
        assert_eq!(result.skipped, 3);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            IcsParser::parse_date("20240229"),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
        assert_eq!(
            IcsParser::parse_date("20231001T235959Z"),
            Some(Utc.with_ymd_and_hms(2023, 10, 1, 23, 59, 59).unwrap())
        );
        assert_eq!(IcsParser::parse_date("2023100"), None);
        assert_eq!(IcsParser::parse_date("2023-10-01T10:00"), None);
    }

    #[test]
    fn test_no_events() {
        assert!(IcsParser.parse("").is_empty());
        assert!(IcsParser.parse("BEGIN:VCALENDAR\nEND:VCALENDAR\n").is_empty());
    }
}
