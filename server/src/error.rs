//! JSON error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use portaljobs::{AutomationError, RegistryError, ResolveError};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Logs the detail and answers with a generic message.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        log::error!("Internal error: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Full { .. } => {
                log::warn!("{}", err);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            RegistryError::NotFound(_) => Self::not_found("Job not found"),
        }
    }
}

impl From<AutomationError> for ApiError {
    fn from(err: AutomationError) -> Self {
        match err {
            AutomationError::Validation(message) => Self::bad_request(message),
            AutomationError::Registry(err) => err.into(),
            other => Self::internal(other),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingParameter(message) => Self::bad_request(message),
            ResolveError::InvalidName(_) => Self::bad_request("Invalid file name"),
            ResolveError::NotFound(_) => Self::not_found("File not found"),
            ResolveError::NotPreviewable => Self::bad_request(err.to_string()),
            ResolveError::Read { .. } => Self::internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        log::debug!("Rejected request body: {}", rejection);
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let full: ApiError = RegistryError::Full { capacity: 3 }.into();
        assert_eq!(full.status, StatusCode::SERVICE_UNAVAILABLE);

        let invalid: ApiError = AutomationError::Validation("No vendors provided".into()).into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.message, "No vendors provided");

        let traversal: ApiError = ResolveError::InvalidName("../x".into()).into();
        assert_eq!(traversal.status, StatusCode::BAD_REQUEST);

        let read: ApiError = ResolveError::Read {
            path: "/srv/secret".into(),
            source: std::io::Error::other("boom"),
        }
        .into();
        assert_eq!(read.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read.message, "Internal server error");
    }
}
