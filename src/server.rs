//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/weekly-summary` | Rebuild and return the weeks of a date range |
//! | `POST` | `/search` | Dual-corpus search for one subject |
//! | `POST` | `/ask` | Answer a question from retrieved context |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `configuration` (500),
//! `provider_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! on another port can call the API.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use pawlog_core::answer::{ask, AnswerGenerator, ContextPreview};
use pawlog_core::embedding::{ensure_dimension, EmbeddingProvider};
use pawlog_core::error::{classify, Error};
use pawlog_core::models::{SubjectId, TimelineEntry, WeeklySummary};
use pawlog_core::rebuild::{rebuild_range, require_subject};
use pawlog_core::search::{search_both, DualResults, SearchLimits};
use pawlog_core::store::IndexStore;

use crate::answer::create_generator;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;
use crate::weekly::{parse_date, resolve_range, today};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteStore>,
    provider: Arc<dyn EmbeddingProvider>,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

/// Build the router. Providers are created once here and shared by every
/// request. An embedding provider whose width differs from the index's
/// declared width is rejected before the server starts.
pub async fn router(config: Arc<Config>, store: Arc<SqliteStore>) -> anyhow::Result<Router> {
    let provider = create_provider(&config.embedding)?;
    if provider.dims() > 0 {
        ensure_dimension(provider.as_ref(), store.vector_dims().await?)?;
    }
    let generator = create_generator(&config.answer)?;
    let state = AppState {
        config,
        store,
        provider,
        generator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/weekly-summary", get(handle_weekly_summary))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state))
}

/// Serve until the process is terminated.
pub async fn run_server(config: &Config, store: Arc<SqliteStore>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()), store).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server listening");
    println!("Pawlog server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        let (status, code) = match classify(&err) {
            Some(Error::Validation(_)) => (StatusCode::BAD_REQUEST, "bad_request"),
            Some(Error::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Some(Error::Configuration(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
            }
            Some(Error::Provider(_)) => (StatusCode::BAD_GATEWAY, "provider_error"),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message,
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /weekly-summary ============

#[derive(Deserialize)]
struct WeeklySummaryQuery {
    subject_id: Option<SubjectId>,
    days: Option<u32>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Serialize)]
struct WeekView {
    week_start: NaiveDate,
    week_end: NaiveDate,
    log_count: usize,
    summary: WeeklySummary,
    timeline: Vec<TimelineEntry>,
}

#[derive(Serialize)]
struct FailedWeek {
    week_start: NaiveDate,
    week_end: NaiveDate,
    error: String,
}

#[derive(Serialize)]
struct WeeklySummaryResponse {
    subject_id: SubjectId,
    date_range: DateRange,
    weeks: Vec<WeekView>,
    failed: Vec<FailedWeek>,
}

/// Rebuild every week of the requested range and return the fresh records.
///
/// `days` takes precedence over `start_date`/`end_date`. A lone
/// `start_date` runs to today and a lone `end_date` looks back the
/// configured lookback, as on the command line.
async fn handle_weekly_summary(
    State(state): State<AppState>,
    Query(query): Query<WeeklySummaryQuery>,
) -> Result<Json<WeeklySummaryResponse>, AppError> {
    let subject_id = query
        .subject_id
        .ok_or_else(|| bad_request("subject_id parameter is required"))?;

    let since = query.start_date.as_deref().map(parse_date).transpose()?;
    let until = query.end_date.as_deref().map(parse_date).transpose()?;
    let (start, end) = resolve_range(
        query.days,
        since,
        until,
        state.config.retrieval.lookback_days,
        today(),
    )?;

    let store = state.store.as_ref();
    let report = rebuild_range(store, store, subject_id, start, end).await?;

    Ok(Json(WeeklySummaryResponse {
        subject_id,
        date_range: DateRange { start, end },
        weeks: report
            .succeeded
            .into_iter()
            .map(|w| WeekView {
                week_start: w.summary.window.start,
                week_end: w.summary.window.end,
                log_count: w.log_count,
                summary: w.summary,
                timeline: w.timeline,
            })
            .collect(),
        failed: report
            .failed
            .into_iter()
            .map(|f| FailedWeek {
                week_start: f.window.start,
                week_end: f.window.end,
                error: f.error.to_string(),
            })
            .collect(),
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    subject_id: SubjectId,
    query: String,
    top_k_internal: Option<usize>,
    top_k_external: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<DualResults>, AppError> {
    let req = json_body(payload)?;
    let defaults = state.config.retrieval.limits();
    let limits = SearchLimits {
        top_k_internal: req.top_k_internal.unwrap_or(defaults.top_k_internal),
        top_k_external: req.top_k_external.unwrap_or(defaults.top_k_external),
    };
    if limits.top_k_internal == 0 || limits.top_k_external == 0 {
        return Err(bad_request("top_k must be at least 1"));
    }

    let store = state.store.as_ref();
    require_subject(store, req.subject_id).await?;
    let results = search_both(
        store,
        state.provider.as_ref(),
        &req.query,
        req.subject_id,
        limits,
    )
    .await?;
    Ok(Json(results))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    subject_id: SubjectId,
    question: String,
}

#[derive(Serialize)]
struct ContextPreviews {
    internal: Vec<ContextPreview>,
    external: Vec<ContextPreview>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    degraded: bool,
    context: ContextPreviews,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let req = json_body(payload)?;
    let store = state.store.as_ref();
    let subject = require_subject(store, req.subject_id).await?;

    let outcome = ask(
        store,
        state.provider.as_ref(),
        state.generator.as_deref(),
        &subject,
        &req.question,
        state.config.retrieval.limits(),
    )
    .await?;

    Ok(Json(AskResponse {
        answer: outcome.answer,
        degraded: outcome.degraded,
        context: ContextPreviews {
            internal: outcome.results.internal.iter().map(ContextPreview::of).collect(),
            external: outcome.results.external.iter().map(ContextPreview::of).collect(),
        },
    }))
}
