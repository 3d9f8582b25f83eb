//! Format-specific parsers
//!
//! Each supported export format has a parser module that implements the
//! [`FormatParser`](super::FormatParser) trait.
//!
//! ## Supported Formats
//!
//! | Format | Module | Source |
//! |--------|--------|--------|
//! | `git log` pipe output | [`git`] | `git` |
//! | WhatsApp chat export | [`whatsapp`] | `whatsapp` |
//! | Slack channel JSON | [`slack`] | `slack` |
//! | Discord channel JSON | [`discord`] | `discord` |
//! | Telegram `result.json` | [`telegram`] | `telegram` |
//! | iCalendar `.ics` | [`ics`] | `calendar` |
//! | GitHub events API | [`github`] | `github-api` |
//!
//! Documents nobody recognizes are wrapped by [`raw::wrap`].

pub mod discord;
pub mod git;
pub mod github;
pub mod ics;
pub(crate) mod json;
pub mod raw;
pub mod slack;
pub mod telegram;
pub mod whatsapp;

pub use discord::DiscordParser;
pub use git::GitLogParser;
pub use github::GithubEventsParser;
pub use ics::IcsParser;
pub use slack::SlackParser;
pub use telegram::TelegramParser;
pub use whatsapp::WhatsAppParser;

use super::FormatParser;
use crate::types::DetectedFormat;

/// Create all parsers reachable through format detection.
///
/// The GitHub mapper is not included; its input comes from the API client,
/// never from an upload.
pub fn create_all_parsers() -> Vec<Box<dyn FormatParser>> {
    vec![
        Box::new(TelegramParser),
        Box::new(SlackParser),
        Box::new(DiscordParser),
        Box::new(IcsParser),
        Box::new(WhatsAppParser),
        Box::new(GitLogParser),
    ]
}

/// Get the parser for a detected format.
///
/// Returns `None` for [`DetectedFormat::Raw`], which has no parser.
pub fn parser_for(format: DetectedFormat) -> Option<Box<dyn FormatParser>> {
    match format {
        DetectedFormat::Telegram => Some(Box::new(TelegramParser)),
        DetectedFormat::Slack => Some(Box::new(SlackParser)),
        DetectedFormat::Discord => Some(Box::new(DiscordParser)),
        DetectedFormat::Calendar => Some(Box::new(IcsParser)),
        DetectedFormat::WhatsApp | DetectedFormat::WhatsAppFallback => {
            Some(Box::new(WhatsAppParser))
        }
        DetectedFormat::Git | DetectedFormat::GitFallback => Some(Box::new(GitLogParser)),
        DetectedFormat::Raw => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[test]
    fn test_create_all_parsers() {
        let parsers = create_all_parsers();
        assert_eq!(parsers.len(), 6);
        assert!(parsers.iter().any(|p| p.source() == Source::Calendar));
        assert!(!parsers.iter().any(|p| p.source() == Source::GithubApi));
    }

    #[test]
    fn test_parser_for_matches_detected_source() {
        for format in [
            DetectedFormat::Telegram,
            DetectedFormat::Slack,
            DetectedFormat::Discord,
            DetectedFormat::Calendar,
            DetectedFormat::WhatsApp,
            DetectedFormat::WhatsAppFallback,
            DetectedFormat::Git,
            DetectedFormat::GitFallback,
        ] {
            let parser = parser_for(format).expect("parser for detected format");
            assert_eq!(parser.source(), format.source());
        }
    }

    #[test]
    fn test_parser_for_raw() {
        assert!(parser_for(DetectedFormat::Raw).is_none());
    }
}
