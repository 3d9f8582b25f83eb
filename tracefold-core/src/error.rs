//! Error types for tracefold-core

use thiserror::Error;

/// Main error type for the tracefold-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Upload exceeds the configured size limit; parsing never started
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: u64, limit: u64 },

    /// Document was empty or whitespace only
    #[error("document is empty")]
    EmptyDocument,

    /// Invalid aggregation or store query
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Ingestion job not found
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// GitHub API error
    #[error("GitHub error: {0}")]
    Github(String),
}

/// Result type alias for tracefold-core
pub type Result<T> = std::result::Result<T, Error>;
