//! HTTP client for the GitHub public events API
//!
//! Fetches `GET /users/{user}/events` and maps the response through
//! [`GithubEventsParser`], so imported events carry the same content-derived
//! ids on every fetch.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;

use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::ingest::parsers::GithubEventsParser;
use crate::ingest::ParseResult;

/// Events per page; the API maximum
pub const PAGE_SIZE: usize = 100;

/// HTTP client for the GitHub REST API
pub struct GithubClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    /// Create a client from configuration.
    ///
    /// `token` overrides the configured token (and `GITHUB_TOKEN`).
    /// Unauthenticated clients work with a lower rate limit.
    pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let base_url = config.api_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("github.api_url must not be empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("tracefold/", env!("CARGO_PKG_VERSION"))),
        );

        if let Some(token) = token.or_else(|| config.resolved_token()) {
            let auth_value = format!("Bearer {}", token.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid github token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// URL of a user's public events feed
    pub fn events_url(&self, user: &str) -> String {
        format!(
            "{}/users/{}/events?per_page={}",
            self.base_url,
            urlencoding::encode(user),
            PAGE_SIZE
        )
    }

    /// Fetch a user's recent public events as canonical events.
    pub async fn fetch_user_events(&self, user: &str) -> Result<ParseResult> {
        let user = user.trim();
        if user.is_empty() {
            return Err(Error::Github("username is required".to_string()));
        }

        let url = self.events_url(user);
        tracing::debug!(url = %url, "Fetching GitHub events");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Github(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Github(format!("API error ({}): {}", status, error_text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Github(format!("failed to parse response: {}", e)))?;

        let result = map_events(&body)?;
        tracing::info!(
            user,
            events = result.events.len(),
            skipped = result.skipped,
            "Fetched GitHub events"
        );
        Ok(result)
    }
}

/// Blocking wrapper around [`GithubClient`] for synchronous callers.
pub struct SyncGithubClient {
    inner: GithubClient,
    runtime: tokio::runtime::Runtime,
}

impl SyncGithubClient {
    pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Github(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            inner: GithubClient::new(config, token)?,
            runtime,
        })
    }

    /// Fetch a user's recent public events (blocking)
    pub fn fetch_user_events(&self, user: &str) -> Result<ParseResult> {
        self.runtime.block_on(self.inner.fetch_user_events(user))
    }
}

/// Map an API response body; anything but an array is an error.
pub fn map_events(body: &Value) -> Result<ParseResult> {
    let items = body
        .as_array()
        .ok_or_else(|| Error::Github("invalid response from GitHub API".to_string()))?;

    let mut result = ParseResult::default();
    for item in items {
        match GithubEventsParser::map_event(item) {
            Some(event) => result.events.push(event),
            None => result.skipped += 1,
        }
    }
    Ok(result)
}
