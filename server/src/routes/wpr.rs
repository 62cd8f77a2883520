//! Weekly performance reports.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use portaljobs::automation::{ReportAutomation, ReportRequest, Submission};
use portaljobs::files::ReportSummary;
use portaljobs::status::{StatusFamily, StatusResponse};

use crate::error::ApiError;
use crate::routes::{events, file_response, status_for, JobQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/wpr/generate", post(generate))
        .route("/jobs/wpr/status", get(status))
        .route("/jobs/wpr/events", get(job_events))
        .route("/jobs/wpr/download", get(download))
        .route("/jobs/wpr/list", get(list))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadQuery {
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportList {
    reports: Vec<ReportSummary>,
    total_reports: usize,
}

/// Every field is optional; an empty body uses the defaults.
async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Submission>, ApiError> {
    let request: ReportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReportRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::bad_request(format!("Invalid request body: {}", err)))?
    };
    let automation = ReportAutomation::new(request);
    Ok(Json(state.runner.submit(Arc::new(automation)).await?))
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    status_for(&state, StatusFamily::WeeklyReport, &query).await
}

async fn job_events(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<impl IntoResponse, ApiError> {
    events::job_events(state, StatusFamily::WeeklyReport, query).await
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file = state
        .resolver
        .resolve_weekly_report(query.file_name.as_deref())
        .await?;
    file_response(file, false)
}

async fn list(State(state): State<AppState>) -> Result<Json<ReportList>, ApiError> {
    let reports = state.resolver.weekly_reports().await?;
    Ok(Json(ReportList {
        total_reports: reports.len(),
        reports,
    }))
}
