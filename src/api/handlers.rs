use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::monitor::{JobConfig, JobRegistry, JobSummary, MonitorError};
use crate::notify::{is_valid_slack_webhook, NotificationResult};

/// Application state shared across handlers
pub struct AppState {
    pub registry: Arc<JobRegistry>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_jobs: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_jobs: state.registry.len(),
    })
}

// ============================================================================
// Monitoring Jobs
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub job_id: String,
}

pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Json(config): Json<JobConfig>,
) -> Result<Json<StartResponse>, ApiError> {
    let job_id = state.registry.start(config)?;
    Ok(Json(StartResponse { job_id }))
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSummary>> {
    Json(state.registry.list())
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSummary>, ApiError> {
    state
        .registry
        .get(&job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job '{}' not found", job_id)))
}

#[derive(Serialize)]
pub struct StopResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<usize>,
}

pub async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    state.registry.stop(&job_id)?;
    Ok(Json(StopResponse {
        success: true,
        stopped: None,
    }))
}

pub async fn stop_all_jobs(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    let stopped = state.registry.stop_all();
    Json(StopResponse {
        success: true,
        stopped: Some(stopped),
    })
}

// ============================================================================
// Webhooks
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub webhook_url: String,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

pub async fn validate_webhook(Json(request): Json<WebhookRequest>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: is_valid_slack_webhook(&request.webhook_url),
    })
}

pub async fn test_webhook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WebhookRequest>,
) -> Result<Json<NotificationResult>, ApiError> {
    let result = state.registry.test_webhook(&request.webhook_url).await?;
    Ok(Json(result))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Validation(_) => ApiError::BadRequest(err.to_string()),
            MonitorError::NotFound(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
