//! Ingestion layer: raw uploads to canonical events
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────┐   ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │  bytes   │ ─►│ decode │ ─►│  detect  │ ─►│ FormatParser │ ─►│ EventStore │
//! │ (upload) │   └────────┘   └──────────┘   │  ├─ git      │   └────────────┘
//! └──────────┘                     │         │  ├─ whatsapp │
//!                                  │         │  ├─ slack    │
//!                                  │         │  └─ ...      │
//!                                  │         └──────────────┘
//!                                  └─ nothing matched ─► raw::wrap
//! ```
//!
//! Identity is assigned inside the parsers, so re-ingesting a document
//! yields the same ids and the store absorbs the duplicates.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tracefold_core::{Config, Database, IngestCoordinator};
//!
//! let config = Config::load()?;
//! let db = Database::open(&Config::database_path())?;
//! db.migrate()?;
//!
//! let coordinator = IngestCoordinator::new(db, config.ingest);
//! let report = coordinator.ingest_path(std::path::Path::new("chat.txt"))?;
//! println!("{}: {} events, {} new", report.detected, report.count, report.inserted);
//! # Ok::<(), tracefold_core::Error>(())
//! ```

pub mod decode;
pub mod detect;
pub mod identity;
pub mod jobs;
mod parser;
pub mod parsers;
pub mod timestamp;

pub use jobs::{Job, JobHandle, JobQueue, JobStatus};
pub use parser::{FormatParser, ParseResult};

use crate::config::IngestConfig;
use crate::db::{AppendReport, EventStore, IngestRun};
use crate::error::{Error, Result};
use crate::types::{DetectedFormat, Event};
use chrono::{DateTime, Utc};
use parsers::{raw, GitLogParser, WhatsAppParser};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A decoded document after detection and parsing, before storage.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub detected: DetectedFormat,
    pub events: Vec<Event>,
    /// Lines or records the parser dropped
    pub skipped: usize,
}

impl ParsedDocument {
    fn from_parse(detected: DetectedFormat, result: ParseResult) -> Self {
        Self {
            detected,
            events: result.events,
            skipped: result.skipped,
        }
    }
}

/// Result of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// File name or upload name
    pub name: String,
    pub detected: DetectedFormat,
    /// Events produced by parsing
    pub count: usize,
    /// Events that were new to the store
    pub inserted: usize,
    /// Events already stored from an earlier ingestion
    pub duplicates: usize,
    /// Lines or records dropped while parsing
    pub skipped: usize,
    /// The produced events, in input order
    pub events: Vec<Event>,
}

/// Result of ingesting several files.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// One report per file that was ingested
    pub reports: Vec<IngestReport>,
    /// Errors encountered (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    /// Total events produced across all files
    pub fn events_produced(&self) -> usize {
        self.reports.iter().map(|r| r.count).sum()
    }

    /// Total events newly stored across all files
    pub fn events_inserted(&self) -> usize {
        self.reports.iter().map(|r| r.inserted).sum()
    }
}

/// Detect the format of a decoded document and parse it.
///
/// Pure: touches neither the store nor the clock (`received_at` stamps the
/// raw fallback event). Signature matches are parsed by their format's
/// parser; otherwise the git parser and then the chat parser are tried and
/// the first non-empty result is kept, so no document is parsed twice.
pub fn parse_document(text: &str, received_at: DateTime<Utc>) -> ParsedDocument {
    if let Some(detected) = detect::detect_signature(text) {
        let result = parsers::parser_for(detected)
            .map(|parser| parser.parse(text))
            .unwrap_or_default();
        return ParsedDocument::from_parse(detected, result);
    }

    let git = GitLogParser.parse(text);
    if !git.is_empty() {
        return ParsedDocument::from_parse(DetectedFormat::GitFallback, git);
    }

    let chat = WhatsAppParser.parse(text);
    if !chat.is_empty() {
        return ParsedDocument::from_parse(DetectedFormat::WhatsAppFallback, chat);
    }

    ParsedDocument {
        detected: DetectedFormat::Raw,
        events: vec![raw::wrap(text, received_at)],
        skipped: 0,
    }
}

/// Coordinates decoding, detection, parsing and storage.
///
/// The coordinator is responsible for:
/// - Enforcing the upload size limit before any decoding
/// - Running detection and the matching parser
/// - Appending events to the injected store and reporting duplicates
pub struct IngestCoordinator<S: EventStore> {
    store: S,
    config: IngestConfig,
}

impl<S: EventStore> IngestCoordinator<S> {
    /// Create a coordinator writing to `store`.
    pub fn new(store: S, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// The store events are appended to.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Reject uploads over the configured limit.
    pub fn check_size(&self, size: u64) -> Result<()> {
        let limit = self.config.max_upload_bytes;
        if size > limit {
            return Err(Error::UploadTooLarge { size, limit });
        }
        Ok(())
    }

    /// Ingest an uploaded document.
    ///
    /// ## Errors
    ///
    /// - [`Error::UploadTooLarge`] before decoding when over the limit
    /// - [`Error::EmptyDocument`] when the decoded text is blank
    /// - [`Error::Database`] when the store rejects the batch
    ///
    /// Unparseable lines are not errors; they are counted in `skipped`.
    pub fn ingest_bytes(&self, bytes: &[u8], name: &str) -> Result<IngestReport> {
        self.check_size(bytes.len() as u64)?;

        let text = decode::decode(bytes);
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument);
        }

        let received_at = Utc::now();
        let parsed = parse_document(&text, received_at);
        let appended = self.store.append_if_absent(&parsed.events)?;

        let report = IngestReport {
            name: name.to_string(),
            detected: parsed.detected,
            count: parsed.events.len(),
            inserted: appended.inserted,
            duplicates: appended.duplicates,
            skipped: parsed.skipped,
            events: parsed.events,
        };

        tracing::info!(
            name = %report.name,
            detected = %report.detected,
            count = report.count,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "Ingested document"
        );
        self.record_run(
            &report.name,
            report.detected.as_str(),
            &report.events,
            appended,
            report.skipped,
            received_at,
        );

        Ok(report)
    }

    /// Ingest a file from disk.
    ///
    /// The size limit is checked against file metadata before reading.
    pub fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let metadata = std::fs::metadata(path)?;
        self.check_size(metadata.len())?;

        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.ingest_bytes(&bytes, &name)
    }

    /// Ingest every file in `paths`, collecting per-file errors.
    ///
    /// The callback receives `(current_index, total, path)` before each file.
    pub fn ingest_paths<F>(&self, paths: &[PathBuf], mut on_progress: F) -> BatchResult
    where
        F: FnMut(usize, usize, &Path),
    {
        let total = paths.len();
        let mut result = BatchResult::default();

        for (i, path) in paths.iter().enumerate() {
            on_progress(i, total, path);

            match self.ingest_path(path) {
                Ok(report) => result.reports.push(report),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to ingest file");
                    result.errors.push((path.clone(), e.to_string()));
                }
            }
        }

        result
    }

    /// Expand a glob pattern and ingest every matching file.
    pub fn ingest_glob<F>(&self, pattern: &str, on_progress: F) -> Result<BatchResult>
    where
        F: FnMut(usize, usize, &Path),
    {
        let paths = expand_glob(pattern)?;
        Ok(self.ingest_paths(&paths, on_progress))
    }

    /// Store events produced outside the upload path (the GitHub importer).
    pub fn ingest_events(&self, name: &str, label: &str, events: &[Event]) -> Result<AppendReport> {
        let appended = self.store.append_if_absent(events)?;

        tracing::info!(
            name,
            detected = label,
            count = events.len(),
            inserted = appended.inserted,
            duplicates = appended.duplicates,
            "Imported events"
        );
        self.record_run(name, label, events, appended, 0, Utc::now());

        Ok(appended)
    }

    fn record_run(
        &self,
        name: &str,
        detected: &str,
        events: &[Event],
        appended: AppendReport,
        skipped: usize,
        ingested_at: DateTime<Utc>,
    ) {
        let run = IngestRun {
            name: name.to_string(),
            detected: detected.to_string(),
            produced: events.len(),
            inserted: appended.inserted,
            duplicates: appended.duplicates,
            skipped,
            ingested_at,
        };
        // The audit trail is best effort; the events themselves are stored.
        if let Err(e) = self.store.record_run(&run) {
            tracing::warn!(name, error = %e, "Failed to record ingest run");
        }
    }
}

/// Expand a glob pattern to the regular files it matches, sorted.
///
/// A pattern without wildcards names a single file.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern)
        .map_err(|e| Error::InvalidQuery(format!("invalid glob pattern {:?}: {}", pattern, e)))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable glob entry");
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}
