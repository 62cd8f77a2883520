//! Server-sent status snapshots for one job.
//!
//! A snapshot is pushed when the job's progress changes and at least every
//! poll interval, until the job is terminal, the client goes away or the
//! server shuts down.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use tokio::sync::broadcast::error::RecvError;

use portaljobs::status::{StatusFamily, StatusResponse};

use crate::error::ApiError;
use crate::routes::JobQuery;
use crate::state::AppState;

fn snapshot_event(snapshot: &StatusResponse) -> Event {
    Event::default()
        .event("status")
        .json_data(snapshot)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

pub async fn job_events(
    state: AppState,
    family: StatusFamily,
    query: JobQuery,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let job_id = query.require()?.to_string();
    let first = state
        .status
        .status(family, &job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let mut rx = state.broadcaster.subscribe();
    let status = Arc::clone(&state.status);
    let interval = state.poll_interval;
    let shutdown = state.shutdown.clone();
    log::debug!("Streaming status of job {}", job_id);

    let stream = stream! {
        let mut snapshot = first;
        let mut closed = false;
        'stream: loop {
            yield Ok::<Event, Infallible>(snapshot_event(&snapshot));
            if snapshot.status.is_terminal() {
                break;
            }

            let tick = tokio::time::sleep(interval);
            tokio::pin!(tick);
            loop {
                if closed {
                    tokio::select! {
                        _ = &mut tick => break,
                        _ = shutdown.cancelled() => break 'stream,
                    }
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break 'stream,
                    _ = &mut tick => break,
                    received = rx.recv() => match received {
                        Ok(event) if event.job_id == job_id => break,
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => closed = true,
                    },
                }
            }

            match status.status(family, &job_id).await {
                Some(next) => snapshot = next,
                None => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
