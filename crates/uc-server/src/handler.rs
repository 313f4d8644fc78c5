use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use uc_core::core::{
    aggregate, score, Clock, ConversationId, EvaluationTarget, MetricsError, MetricsSource,
    QualityMetrics, ReportStore, StoreError, ThresholdSet,
};
use uc_store::{export_reports, select_reports, ExportFormat, ReportExportFilter};

use crate::jobs::{start_evaluation_job, JobError, JobRegistry};

// ---------------------------------------------------------------------------
// AppState — shared state for all handlers
// ---------------------------------------------------------------------------

pub struct AppState {
    pub thresholds: Arc<ThresholdSet>,
    pub source: Arc<dyn MetricsSource>,
    pub store: Arc<dyn ReportStore>,
    pub clock: Arc<dyn Clock>,
    pub jobs: JobRegistry,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/thresholds", get(get_thresholds))
        .route("/api/v1/score", post(post_score))
        .route(
            "/api/v1/evaluations",
            get(list_jobs).post(post_evaluations),
        )
        .route(
            "/api/v1/evaluations/{job_id}",
            get(get_job).delete(cancel_job),
        )
        .route("/api/v1/reports", get(list_reports).delete(clear_reports))
        .route("/api/v1/reports/summary", get(get_summary))
        .route("/api/v1/reports/export", get(export))
        .route(
            "/api/v1/reports/{conversation_id}",
            get(get_report).delete(delete_report),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidMetrics(#[from] MetricsError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("report for conversation {0} not found")]
    ReportNotFound(ConversationId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

pub fn api_error_to_response(err: ApiError) -> Response {
    let (status, error_type) = match &err {
        ApiError::InvalidMetrics(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_metrics_error"),
        ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
        ApiError::Job(JobError::NotFound(_)) | ApiError::ReportNotFound(_) => {
            (StatusCode::NOT_FOUND, "not_found_error")
        }
        ApiError::Job(JobError::AlreadyFinished(_)) => (StatusCode::CONFLICT, "conflict_error"),
        ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    let body = json!({
        "error": {
            "message": err.to_string(),
            "type": error_type,
            "code": status.as_u16(),
        }
    });

    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        api_error_to_response(self)
    }
}

/// Run a store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ReportStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("failed to join store task: {e}")))?;
    Ok(result?)
}

// ---------------------------------------------------------------------------
// Health / thresholds / ad-hoc scoring
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_thresholds(State(state): State<Arc<AppState>>) -> Json<ThresholdSet> {
    Json(state.thresholds.as_ref().clone())
}

async fn post_score(
    State(state): State<Arc<AppState>>,
    Json(metrics): Json<QualityMetrics>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = score(&metrics, &state.thresholds)?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// Evaluation jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
    pub targets: Vec<EvaluationTarget>,
}

/// Identifiers end up as URL path segments at the remote source.
fn validate_identifier(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    if matches!(value, "." | "..")
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '%'))
    {
        return Err(ApiError::BadRequest(format!(
            "{field} contains reserved characters: {value}"
        )));
    }
    Ok(())
}

fn validate_target(target: &EvaluationTarget) -> Result<(), ApiError> {
    validate_identifier("conversation_id", target.conversation_id.as_str())?;
    validate_identifier("seed_id", target.seed_id.as_str())
}

async fn post_evaluations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.targets.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one evaluation target required".to_owned(),
        ));
    }
    for target in &request.targets {
        validate_target(target)?;
    }

    let total = request.targets.len();
    let job_id = start_evaluation_job(&state, request.targets).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "total": total })),
    ))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.jobs.list().await)
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .jobs
        .get(job_id)
        .await
        .ok_or(JobError::NotFound(job_id))?;
    Ok(Json(snapshot))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.jobs.cancel(job_id).await?;
    tracing::info!(%job_id, processed = snapshot.processed, "evaluation job cancellation requested");
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ReportsQuery {
    pub passed: Option<bool>,
    pub seed_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub format: Option<ExportFormat>,
}

impl ReportsQuery {
    fn filter(&self) -> ReportExportFilter {
        ReportExportFilter {
            seed_id: self.seed_id.clone(),
            passed: self.passed,
            since: self.since,
            until: self.until,
        }
    }
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter();
    let reports = with_store(&state, move |store| select_reports(store, &filter)).await?;
    Ok(Json(reports))
}

async fn clear_reports(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    with_store(&state, |store| store.clear()).await?;
    tracing::info!("report store cleared");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_summary(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let reports = with_store(&state, |store| store.list()).await?;
    Ok(Json(aggregate(&reports)))
}

async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportsQuery>,
) -> Result<Response, ApiError> {
    let format = query.format.unwrap_or_default();
    let filter = query.filter();
    let body = with_store(&state, move |store| {
        let reports = select_reports(store, &filter)?;
        export_reports(&reports, format)
    })
    .await?;

    let content_type = match format {
        ExportFormat::Json => "application/json",
        ExportFormat::Jsonl => "application/x-ndjson",
    };
    Ok((StatusCode::OK, [("content-type", content_type)], body).into_response())
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = ConversationId::new(conversation_id);
    let lookup = id.clone();
    let report = with_store(&state, move |store| store.get(&lookup))
        .await?
        .ok_or(ApiError::ReportNotFound(id))?;
    Ok(Json(report))
}

async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = ConversationId::new(conversation_id);
    let lookup = id.clone();
    let removed = with_store(&state, move |store| store.remove(&lookup)).await?;
    if !removed {
        return Err(ApiError::ReportNotFound(id));
    }
    tracing::info!(conversation_id = %id, "report deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
