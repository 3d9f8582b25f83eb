//! Core domain types for tracefold
//!
//! These types represent the canonical data model that normalizes activity
//! from every supported export format.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One normalized unit of activity (a commit, a chat message, a calendar entry) |
//! | **Source** | The origin system of an event (git, whatsapp, slack, ...) |
//! | **Actor** | The person or system that produced an event; `"unknown"` if absent |
//! | **Detection tag** | Which format the detector classified an uploaded document as |
//! | **Day-delta** | Whole calendar days between today and an event's local date |
//!
//! Events are created by parsers only. The pipeline never mutates them after
//! identity is assigned; the only way to remove them is a bulk clear.

use crate::ingest::identity;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

/// Actor used when a record carries no author.
pub const UNKNOWN_ACTOR: &str = "unknown";

// ============================================
// Source
// ============================================

/// Origin format of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "git")]
    Git,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    #[serde(rename = "slack")]
    Slack,
    #[serde(rename = "discord")]
    Discord,
    #[serde(rename = "telegram")]
    Telegram,
    #[serde(rename = "github-api")]
    GithubApi,
    #[serde(rename = "calendar")]
    Calendar,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Source {
    /// Returns the identifier used in storage, identity hashing and the wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Git => "git",
            Source::WhatsApp => "whatsapp",
            Source::Slack => "slack",
            Source::Discord => "discord",
            Source::Telegram => "telegram",
            Source::GithubApi => "github-api",
            Source::Calendar => "calendar",
            Source::Unknown => "unknown",
        }
    }

    /// Returns the display name for this source
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Git => "Git",
            Source::WhatsApp => "WhatsApp",
            Source::Slack => "Slack",
            Source::Discord => "Discord",
            Source::Telegram => "Telegram",
            Source::GithubApi => "GitHub",
            Source::Calendar => "Calendar",
            Source::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(Source::Git),
            "whatsapp" => Ok(Source::WhatsApp),
            "slack" => Ok(Source::Slack),
            "discord" => Ok(Source::Discord),
            "telegram" => Ok(Source::Telegram),
            "github-api" | "github" => Ok(Source::GithubApi),
            "calendar" | "ics" => Ok(Source::Calendar),
            "unknown" => Ok(Source::Unknown),
            _ => Err(format!("unknown source: {}", s)),
        }
    }
}

// ============================================
// Event
// ============================================

/// Well-known event types
pub mod event_type {
    pub const COMMIT: &str = "code.commit";
    pub const PULL_REQUEST: &str = "code.pr";
    pub const ISSUE: &str = "code.issue";
    pub const CREATE: &str = "code.create";
    pub const CODE_OTHER: &str = "code.other";
    pub const CHAT_MESSAGE: &str = "chat.message";
    pub const CALENDAR_EVENT: &str = "calendar.event";
    pub const RAW: &str = "raw";
}

/// Canonical event record.
///
/// `id` is derived from `(source, timestamp, actor, content_snippet)`, so
/// re-ingesting unchanged input yields the same ids and the store absorbs
/// the duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Content-derived identifier (hex SHA-256)
    pub id: String,
    /// Event instant, always UTC
    #[serde(serialize_with = "serialize_iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Origin format
    pub source: Source,
    /// Who produced the event
    pub actor: String,
    /// Coarse semantic kind, e.g. `code.commit`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Heuristic labels
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Clamped human-readable body
    pub content_snippet: String,
}

impl Event {
    /// Build an event, clamping content to `limit` characters and assigning
    /// its content-derived id.
    ///
    /// An empty or whitespace-only actor becomes [`UNKNOWN_ACTOR`]. The
    /// timestamp is truncated to milliseconds, the precision ids and stores use.
    pub fn new(
        source: Source,
        timestamp: DateTime<Utc>,
        actor: &str,
        event_type: &str,
        tags: &[&str],
        content: &str,
        limit: usize,
    ) -> Self {
        let actor = match actor.trim() {
            "" => UNKNOWN_ACTOR.to_string(),
            trimmed => trimmed.to_string(),
        };
        let timestamp = timestamp.trunc_subsecs(3);
        let content_snippet = identity::clamp_snippet(content, limit);
        let id = identity::event_id(source, &timestamp, &actor, &content_snippet);

        Self {
            id,
            timestamp,
            source,
            actor,
            event_type: event_type.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content_snippet,
        }
    }

    /// Canonical ISO-8601 UTC rendering of the timestamp (millisecond precision).
    pub fn iso_timestamp(&self) -> String {
        identity::iso_timestamp(&self.timestamp)
    }

    /// Whether this event carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

fn serialize_iso_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&identity::iso_timestamp(ts))
}

// ============================================
// Detection
// ============================================

/// Format classification produced by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedFormat {
    Telegram,
    Slack,
    Discord,
    Calendar,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Git,
    GitFallback,
    #[serde(rename = "whatsapp_fallback")]
    WhatsAppFallback,
    Raw,
}

impl DetectedFormat {
    /// Detection tag reported to callers for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedFormat::Telegram => "telegram",
            DetectedFormat::Slack => "slack",
            DetectedFormat::Discord => "discord",
            DetectedFormat::Calendar => "calendar",
            DetectedFormat::WhatsApp => "whatsapp",
            DetectedFormat::Git => "git",
            DetectedFormat::GitFallback => "git_fallback",
            DetectedFormat::WhatsAppFallback => "whatsapp_fallback",
            DetectedFormat::Raw => "raw",
        }
    }

    /// Source stamped on events produced under this classification
    pub fn source(&self) -> Source {
        match self {
            DetectedFormat::Telegram => Source::Telegram,
            DetectedFormat::Slack => Source::Slack,
            DetectedFormat::Discord => Source::Discord,
            DetectedFormat::Calendar => Source::Calendar,
            DetectedFormat::WhatsApp | DetectedFormat::WhatsAppFallback => Source::WhatsApp,
            DetectedFormat::Git | DetectedFormat::GitFallback => Source::Git,
            DetectedFormat::Raw => Source::Unknown,
        }
    }

    /// Whether the classification came from a parse attempt rather than a signature
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            DetectedFormat::GitFallback | DetectedFormat::WhatsAppFallback | DetectedFormat::Raw
        )
    }
}

impl std::fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Aggregation
// ============================================

/// Hours per matrix row
pub const HOURS_PER_DAY: usize = 24;

/// One entry of the actor-frequency ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCount {
    pub name: String,
    pub count: u64,
}

/// Day×hour heatmap plus the events and actor ranking it was computed from.
///
/// `matrix[0]` is today, `matrix[i]` is `i` days ago.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub matrix: Vec<[u32; HOURS_PER_DAY]>,
    pub events: Vec<Event>,
    pub actors: Vec<ActorCount>,
}

impl Aggregate {
    /// Number of days covered by the matrix
    pub fn days(&self) -> usize {
        self.matrix.len()
    }

    /// Sum of all matrix cells
    pub fn total(&self) -> u64 {
        self.matrix
            .iter()
            .flat_map(|row| row.iter())
            .map(|&c| c as u64)
            .sum()
    }

    /// Per-day totals, row order preserved
    pub fn daily_totals(&self) -> Vec<u64> {
        self.matrix
            .iter()
            .map(|row| row.iter().map(|&c| c as u64).sum())
            .collect()
    }
}

/// Window and filters for an aggregation query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub days: u32,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl AggregateQuery {
    pub fn new(days: u32) -> Self {
        Self {
            days,
            ..Default::default()
        }
    }
}
