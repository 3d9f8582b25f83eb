//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tracefold/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tracefold/` (~/.config/tracefold/)
//! - Data: `$XDG_DATA_HOME/tracefold/` (~/.local/share/tracefold/)
//! - State/Logs: `$XDG_STATE_HOME/tracefold/` (~/.local/state/tracefold/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Upload and parsing limits
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Heatmap window defaults
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// Background ingestion jobs
    #[serde(default)]
    pub jobs: JobsConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub events import
    #[serde(default)]
    pub github: GithubConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ingestion limits
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Uploads larger than this are rejected before decoding
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

/// Aggregation window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AggregateConfig {
    /// Window used when a caller does not pass `days`
    #[serde(default = "default_days")]
    pub default_days: u32,

    /// Largest accepted window
    #[serde(default = "default_max_days")]
    pub max_days: u32,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            default_days: default_days(),
            max_days: default_max_days(),
        }
    }
}

impl AggregateConfig {
    /// Check a requested window against the configured bounds.
    pub fn validate_days(&self, days: u32) -> Result<u32> {
        if days == 0 || days > self.max_days {
            return Err(Error::InvalidQuery(format!(
                "days must be between 1 and {}, got {}",
                self.max_days, days
            )));
        }
        Ok(days)
    }
}

fn default_days() -> u32 {
    30
}

fn default_max_days() -> u32 {
    3650
}

/// Background job configuration
#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    /// Finished jobs older than this are pruned on the next submit
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_retention_secs() -> u64 {
    3600
}

/// HTTP API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// GitHub API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    /// Personal access token (falls back to `GITHUB_TOKEN`)
    pub token: Option<String>,

    /// API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
            timeout_secs: default_github_timeout(),
        }
    }
}

impl GithubConfig {
    /// Token from config, or from the `GITHUB_TOKEN` environment variable.
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        if config.aggregate.default_days == 0
            || config.aggregate.default_days > config.aggregate.max_days
        {
            return Err(Error::Config(
                "aggregate.default_days must be between 1 and aggregate.max_days".to_string(),
            ));
        }

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tracefold/config.toml` (~/.config/tracefold/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tracefold").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("tracefold")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tracefold")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/tracefold/events.db` (~/.local/share/tracefold/events.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("events.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tracefold.log")
    }
}
