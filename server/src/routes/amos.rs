//! Solar monitoring exports: Locus Energy and PowerTrack.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use portaljobs::automation::{
    LocusAutomation, LocusRequest, PowerTrackAutomation, PowerTrackRequest, Submission,
};
use portaljobs::files::SolarQuery;
use portaljobs::status::{StatusFamily, StatusResponse};

use crate::error::ApiError;
use crate::routes::{events, file_response, status_for, JobQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/amos/locus", post(submit_locus))
        .route("/jobs/amos/powertrack", post(submit_powertrack))
        .route("/jobs/amos/status", get(status))
        .route("/jobs/amos/events", get(job_events))
        .route("/jobs/amos/download", get(download))
}

async fn submit_locus(
    State(state): State<AppState>,
    payload: Result<Json<LocusRequest>, JsonRejection>,
) -> Result<Json<Submission>, ApiError> {
    let Json(request) = payload?;
    let automation = LocusAutomation::new(request)?;
    Ok(Json(state.runner.submit(Arc::new(automation)).await?))
}

async fn submit_powertrack(
    State(state): State<AppState>,
    payload: Result<Json<PowerTrackRequest>, JsonRejection>,
) -> Result<Json<Submission>, ApiError> {
    let Json(request) = payload?;
    let automation = PowerTrackAutomation::new(request)?;
    Ok(Json(state.runner.submit(Arc::new(automation)).await?))
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    status_for(&state, StatusFamily::Solar, &query).await
}

async fn job_events(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    events::job_events(state, StatusFamily::Solar, query).await
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<SolarQuery>,
) -> Result<Response, ApiError> {
    let file = state.resolver.resolve_solar(&query).await?;
    if file.synthetic {
        log::info!("Serving generated content for {}", file.file_name);
    }
    file_response(file, false)
}
