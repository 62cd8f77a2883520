//! HTTP routes, one module per family.

pub mod amos;
pub mod events;
pub mod jonas;
pub mod wpr;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::{Json, Router};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use portaljobs::files::ServedFile;
use portaljobs::status::{StatusFamily, StatusResponse};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(amos::routes())
        .merge(wpr::routes())
        .merge(jonas::routes())
        .route("/health", axum::routing::get(|| async { "OK" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub job_id: Option<String>,
}

impl JobQuery {
    pub fn require(&self) -> Result<&str, ApiError> {
        self.job_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::bad_request("Job ID required"))
    }
}

pub async fn status_for(
    state: &AppState,
    family: StatusFamily,
    query: &JobQuery,
) -> Result<Json<StatusResponse>, ApiError> {
    let job_id = query.require()?;
    state
        .status
        .status(family, job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// `filename="..."` value safe to place in a header.
fn disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            ' ' => c,
            '"' => '_',
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Attachment response with length and, for files on disk, modification time.
pub fn file_response(
    file: ServedFile,
    no_cache: bool,
) -> Result<axum::response::Response, ApiError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition(&file.file_name)).map_err(ApiError::internal)?,
        )
        .header(header::CONTENT_LENGTH, file.body.len());

    if let Some(modified) = file.last_modified {
        builder = builder.header(
            header::LAST_MODIFIED,
            modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
    }
    if no_cache {
        builder = builder.header(header::CACHE_CONTROL, "no-cache");
    }

    builder.body(Body::from(file.body)).map_err(ApiError::internal)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use portaljobs::config::Config;

    use crate::state::AppState;

    pub struct TestApp {
        pub dir: TempDir,
        pub state: AppState,
        pub router: Router,
    }

    /// No scripts are installed, so every submission runs in demo mode.
    pub fn app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path());
        config.python.interpreter = Some("/nonexistent/python".to_string());
        config.demo.schedule_ms = vec![0, 0, 0];
        config.jobs.poll_interval_ms = 20;
        let state = AppState::new(&config, CancellationToken::new());
        TestApp {
            router: super::router(state.clone()),
            state,
            dir,
        }
    }

    impl TestApp {
        pub fn write_download(&self, relative: &str, content: &str) {
            let path = self.dir.path().join("downloads").join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, headers, body.to_vec())
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
            let (status, _, body) = self.get(uri).await;
            (status, serde_json::from_slice(&body).unwrap())
        }

        pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            let request = Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let (status, _, body) = self.send(request).await;
            (status, serde_json::from_slice(&body).unwrap())
        }

        /// Polls the status route until the job is terminal.
        pub async fn wait_terminal(&self, family: &str, job_id: &str) -> Value {
            for _ in 0..500 {
                let (status, body) = self
                    .get_json(&format!("/jobs/{}/status?jobId={}", family, job_id))
                    .await;
                assert_eq!(status, StatusCode::OK, "{body}");
                if matches!(body["status"].as_str(), Some("completed" | "failed")) {
                    return body;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            panic!("job {job_id} did not finish");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_disposition_escapes_quotes() {
        assert_eq!(disposition("a b.csv"), "attachment; filename=\"a b.csv\"");
        assert_eq!(disposition("x\"y.csv"), "attachment; filename=\"x_y.csv\"");
        assert_eq!(disposition("m².csv"), "attachment; filename=\"m_.csv\"");
    }

    #[test]
    fn test_file_response_headers() {
        let file = ServedFile {
            file_name: "north.csv".to_string(),
            content_type: "text/csv",
            body: b"a,b\n".to_vec(),
            last_modified: Utc.with_ymd_and_hms(2025, 1, 6, 8, 30, 0).single(),
            synthetic: false,
        };
        let response = file_response(file, true).unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        assert_eq!(headers[header::CONTENT_LENGTH], "4");
        assert_eq!(headers[header::LAST_MODIFIED], "Mon, 06 Jan 2025 08:30:00 GMT");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"north.csv\""
        );
    }
}
