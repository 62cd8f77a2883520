//! General-ledger reports: vendor and account exports, previews and the
//! vendor lookup.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use portaljobs::automation::{LedgerAutomation, LedgerRequest, Submission};
use portaljobs::job::FileDescriptor;
use portaljobs::status::{StatusFamily, StatusResponse};

use crate::error::ApiError;
use crate::routes::{events, file_response, status_for, JobQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/jonas/vendors", post(submit_vendors))
        .route("/jobs/jonas/accounts", post(submit_accounts))
        .route("/jobs/jonas/vendors/search", post(search_vendor))
        .route("/jobs/jonas/status", get(status))
        .route("/jobs/jonas/events", get(job_events))
        .route("/jobs/jonas/download", get(download))
        .route("/jobs/jonas/files", post(files))
        .route("/jobs/jonas/preview", get(preview))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadQuery {
    job_id: Option<String>,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewQuery {
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    vendor_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    found: bool,
    vendor_name: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobFiles {
    job_id: String,
    files: Vec<FileDescriptor>,
    total_files: usize,
}

async fn submit_vendors(
    State(state): State<AppState>,
    payload: Result<Json<LedgerRequest>, JsonRejection>,
) -> Result<Json<Submission>, ApiError> {
    let Json(request) = payload?;
    let automation = LedgerAutomation::vendors(request)?;
    Ok(Json(state.runner.submit(Arc::new(automation)).await?))
}

async fn submit_accounts(
    State(state): State<AppState>,
    payload: Result<Json<LedgerRequest>, JsonRejection>,
) -> Result<Json<Submission>, ApiError> {
    let Json(request) = payload?;
    let automation = LedgerAutomation::accounts(request)?;
    Ok(Json(state.runner.submit(Arc::new(automation)).await?))
}

async fn search_vendor(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, ApiError> {
    let Json(request) = payload?;
    let vendor_name = request
        .vendor_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("Vendor name is required"))?
        .to_string();

    let found = state.lookup.search(&vendor_name).await;
    let message = if found {
        format!("Vendor \"{}\" found in AM Automation", vendor_name)
    } else {
        format!("Vendor \"{}\" not found in AM Automation", vendor_name)
    };
    Ok(Json(SearchResult {
        found,
        vendor_name,
        message,
    }))
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    status_for(&state, StatusFamily::Ledger, &query).await
}

async fn job_events(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<impl IntoResponse, ApiError> {
    events::job_events(state, StatusFamily::Ledger, query).await
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file = state
        .resolver
        .resolve_ledger(query.job_id.as_deref(), query.file_name.as_deref())
        .await?;
    file_response(file, true)
}

async fn files(
    State(state): State<AppState>,
    payload: Result<Json<JobQuery>, JsonRejection>,
) -> Result<Json<JobFiles>, ApiError> {
    let Json(query) = payload?;
    let job_id = query.require()?;
    let files = state.resolver.ledger_files(job_id).await?;
    Ok(Json(JobFiles {
        job_id: job_id.to_string(),
        total_files: files.len(),
        files,
    }))
}

async fn preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ApiError> {
    let html = state.resolver.preview(query.file_name.as_deref()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/html"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        html,
    )
        .into_response())
}
