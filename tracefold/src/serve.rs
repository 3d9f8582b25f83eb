//! tracefold-serve - HTTP API over the event store
//!
//! Accepts multipart uploads, runs them through the ingestion pipeline
//! (inline or as a background job) and serves heatmap aggregates.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, Utc};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracefold_core::analytics::{aggregate_window, digest_window, ActivitySummary};
use tracefold_core::github::GithubClient;
use tracefold_core::ingest::JobQueue;
use tracefold_core::{
    AggregateQuery, Config, Database, EventStore, IngestCoordinator, MemoryStore, Source,
};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "tracefold-serve")]
#[command(about = "Serve the tracefold HTTP API")]
#[command(version)]
struct Args {
    /// Address to bind (default: from config)
    #[arg(long)]
    bind: Option<String>,

    /// Keep events in memory instead of the database
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        tracefold_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    if args.memory {
        tracing::info!("Using in-memory event store");
        serve(MemoryStore::new(), config, &bind).await
    } else {
        let db_path = Config::database_path();
        tracing::info!(path = %db_path.display(), "Opening database");

        let db = Database::open(&db_path).context("failed to open database")?;
        db.migrate().context("failed to run database migrations")?;
        serve(db, config, &bind).await
    }
}

async fn serve<S: EventStore + 'static>(store: S, config: Config, bind: &str) -> Result<()> {
    let state = AppState::new(store, config).context("failed to build server state")?;
    let app = router(state);

    let addr = bind
        .parse::<SocketAddr>()
        .map_err(|err| anyhow!("invalid bind address {bind}: {err}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow!("failed to bind {addr}: {err}"))?;

    println!("tracefold-serve running at http://{}", addr);
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================
// State
// ============================================

struct AppState<S: EventStore + 'static> {
    coordinator: Arc<IngestCoordinator<S>>,
    jobs: Arc<JobQueue<S>>,
    github: Arc<GithubClient>,
    config: Arc<Config>,
}

// Manual impl: deriving would require `S: Clone`
impl<S: EventStore + 'static> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            jobs: Arc::clone(&self.jobs),
            github: Arc::clone(&self.github),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: EventStore + 'static> AppState<S> {
    fn new(store: S, config: Config) -> tracefold_core::Result<Self> {
        let coordinator = Arc::new(IngestCoordinator::new(store, config.ingest.clone()));
        let jobs = Arc::new(JobQueue::new(Arc::clone(&coordinator), &config.jobs));
        let github = Arc::new(GithubClient::new(&config.github, None)?);

        Ok(Self {
            coordinator,
            jobs,
            github,
            config: Arc::new(config),
        })
    }
}

fn router<S: EventStore + 'static>(state: AppState<S>) -> Router {
    let body_limit = usize::try_from(state.config.ingest.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health::<S>))
        .route("/ingest", post(ingest::<S>))
        .route("/jobs/:id", get(job_status::<S>))
        .route("/aggregates", get(aggregates::<S>))
        .route("/stats", get(stats::<S>))
        .route("/digest", get(digest::<S>))
        .route("/github", post(github_import::<S>))
        .route("/clear", post(clear::<S>))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================
// Errors
// ============================================

/// Error response: `{"error": message}` with a status code
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<tracefold_core::Error> for ApiError {
    fn from(err: tracefold_core::Error) -> Self {
        use tracefold_core::Error;

        let status = match &err {
            Error::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::EmptyDocument => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::JobNotFound(_) => StatusCode::NOT_FOUND,
            Error::Github(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Io(_) | Error::Json(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run store work off the async executor
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> tracefold_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(ApiError::from)
}

// ============================================
// Handlers
// ============================================

async fn health<S: EventStore + 'static>(State(state): State<AppState<S>>) -> ApiResult<Response> {
    let coordinator = Arc::clone(&state.coordinator);
    let events = blocking(move || coordinator.store().count()).await?;

    Ok(Json(json!({
        "status": "healthy",
        "events": events,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

#[derive(Deserialize)]
struct IngestParams {
    #[serde(rename = "async", default)]
    run_async: bool,
}

async fn ingest<S: EventStore + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<IngestParams>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((name, bytes.to_vec()));
        break;
    }

    let Some((name, bytes)) = upload else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "No file uploaded"));
    };

    if params.run_async {
        let handle = state.jobs.submit(bytes, &name)?;
        return Ok((StatusCode::ACCEPTED, Json(handle)).into_response());
    }

    let coordinator = Arc::clone(&state.coordinator);
    let report = blocking(move || coordinator.ingest_bytes(&bytes, &name)).await?;

    Ok(Json(json!({
        "message": "File ingested successfully",
        "count": report.count,
        "inserted": report.inserted,
        "duplicates": report.duplicates,
        "skipped": report.skipped,
        "detectedType": report.detected,
    }))
    .into_response())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(status, "upload exceeds the size limit")
    } else {
        ApiError::new(StatusCode::BAD_REQUEST, format!("Failed to parse upload: {}", err))
    }
}

async fn job_status<S: EventStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let job = state.jobs.status(&id)?;
    Ok(Json(job).into_response())
}

#[derive(Deserialize)]
struct WindowParams {
    days: Option<u32>,
    source: Option<String>,
    actor: Option<String>,
    tag: Option<String>,
}

impl WindowParams {
    fn days(&self, config: &Config) -> u32 {
        self.days.unwrap_or(config.aggregate.default_days)
    }

    /// Empty filter values mean "no filter".
    fn query(self, config: &Config) -> ApiResult<AggregateQuery> {
        let days = self.days(config);
        let source = match non_empty(self.source) {
            Some(s) => Some(
                s.parse::<Source>()
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?,
            ),
            None => None,
        };

        Ok(AggregateQuery {
            days,
            source,
            actor: non_empty(self.actor),
            tag: non_empty(self.tag),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn aggregates<S: EventStore + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Response> {
    let query = params.query(&state.config)?;
    let aggregate = blocking(move || {
        aggregate_window(
            state.coordinator.store(),
            &query,
            &state.config.aggregate,
            &Local::now(),
        )
    })
    .await?;

    Ok(Json(aggregate).into_response())
}

async fn stats<S: EventStore + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Response> {
    let query = AggregateQuery::new(params.days(&state.config));
    let summary = blocking(move || {
        let now = Local::now();
        let aggregate = aggregate_window(
            state.coordinator.store(),
            &query,
            &state.config.aggregate,
            &now,
        )?;
        Ok(ActivitySummary::from_aggregate(&aggregate, now.date_naive()))
    })
    .await?;

    Ok(Json(summary).into_response())
}

async fn digest<S: EventStore + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Response> {
    let days = params.days(&state.config);
    let digest = blocking(move || {
        digest_window(
            state.coordinator.store(),
            days,
            &state.config.aggregate,
            Utc::now(),
        )
    })
    .await?;

    Ok(Json(digest).into_response())
}

#[derive(Deserialize)]
struct GithubRequest {
    username: String,
    token: Option<String>,
}

async fn github_import<S: EventStore + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<GithubRequest>,
) -> ApiResult<Response> {
    if request.username.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Username is required"));
    }

    let fetched = match non_empty(request.token) {
        Some(token) => {
            GithubClient::new(&state.config.github, Some(token))?
                .fetch_user_events(&request.username)
                .await?
        }
        None => state.github.fetch_user_events(&request.username).await?,
    };

    let count = fetched.events.len();
    let name = format!("github:{}", request.username.trim());
    let coordinator = Arc::clone(&state.coordinator);
    let appended = blocking(move || {
        coordinator.ingest_events(&name, Source::GithubApi.as_str(), &fetched.events)
    })
    .await?;

    Ok(Json(json!({
        "message": "GitHub events imported",
        "count": count,
        "inserted": appended.inserted,
        "duplicates": appended.duplicates,
    }))
    .into_response())
}

async fn clear<S: EventStore + 'static>(State(state): State<AppState<S>>) -> ApiResult<Response> {
    let coordinator = Arc::clone(&state.coordinator);
    let removed = blocking(move || coordinator.store().clear()).await?;

    Ok(Json(json!({
        "message": "Event store cleared",
        "removed": removed,
    }))
    .into_response())
}
