//! # tracefold-core
//!
//! Core library for tracefold - a personal activity timeline built from
//! exported logs.
//!
//! This library provides:
//! - Decoding and format detection for uploaded exports
//! - Parsers for version-control logs, chat exports and calendars
//! - Content-derived event identity, so re-ingestion is idempotent
//! - Event storage with SQLite (or in memory)
//! - Day-by-hour heatmap aggregation and activity summaries
//! - Configuration management and logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use tracefold_core::analytics::aggregate_window;
//! use tracefold_core::{AggregateQuery, Config, Database, IngestCoordinator};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let coordinator = IngestCoordinator::new(db, config.ingest.clone());
//! coordinator
//!     .ingest_path(std::path::Path::new("git.log"))
//!     .expect("failed to ingest");
//!
//! let aggregate = aggregate_window(
//!     coordinator.store(),
//!     &AggregateQuery::new(30),
//!     &config.aggregate,
//!     &chrono::Local::now(),
//! )
//! .expect("failed to aggregate");
//! println!("{} events in the last 30 days", aggregate.total());
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, EventFilter, EventStore, MemoryStore};
pub use error::{Error, Result};
pub use ingest::{IngestCoordinator, IngestReport};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod github;
pub mod ingest;
pub mod logging;
pub mod types;
