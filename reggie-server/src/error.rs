//! # Error Handling and Response Types
//!
//! Errors returned by handlers are converted into npm-registry style JSON
//! bodies:
//!
//! ```json
//! { "error": "not_found", "reason": "document not found" }
//! ```
//!
//! `error` is a machine-readable [`ErrorCode`]; `reason` is the human-readable
//! message. Store errors keep their own classification:
//!
//! - **not_found** (404): package, version, or file absent
//! - **invalid_package** (400): unreadable archive or mismatched manifest
//! - **bad_range** (400): unparsable range expression
//! - **io_failure** (500): disk failure inside the store

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reggie_store::{ErrorKind, StoreError};
use serde::Serialize;

/// Body of every error response
#[derive(Serialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,
    pub reason: String,
}

/// Machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    InvalidPackage,
    BadRange,
    BadRequest,
    IoFailure,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::InvalidPackage => "invalid_package",
            ErrorCode::BadRange => "bad_range",
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::IoFailure => "io_failure",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::InternalError => "internal_server_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidPackage | ErrorCode::BadRange | ErrorCode::BadRequest => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::IoFailure | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::InvalidPackage => ErrorCode::InvalidPackage,
            ErrorKind::BadRange => ErrorCode::BadRange,
            ErrorKind::IoFailure => ErrorCode::IoFailure,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Upstream registry error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The npm registry's standard "missing document" error.
    pub fn document_not_found() -> Self {
        ApiError::NotFound("document not found".to_string())
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::Store(e) => e.kind().into(),
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::BadRequest(_) => ErrorCode::BadRequest,
            ApiError::Upstream(_) => ErrorCode::UpstreamError,
            ApiError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn to_error_response(&self) -> ApiErrorResponse {
        ApiErrorResponse {
            error: self.error_code().as_str().to_string(),
            reason: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.http_status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = code.as_str(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = code.as_str(), "Request rejected");
        }

        let body = axum::Json(self.to_error_response());
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let cases = [
            (StoreError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (StoreError::invalid_package("bad"), StatusCode::BAD_REQUEST, "invalid_package"),
            (StoreError::bad_range(">1 >2"), StatusCode::BAD_REQUEST, "bad_range"),
            (
                StoreError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_failure",
            ),
        ];
        for (err, status, code) in cases {
            let err = ApiError::from(err);
            assert_eq!(err.error_code().http_status(), status);
            assert_eq!(err.to_error_response().error, code);
        }
    }

    #[test]
    fn test_document_not_found_body() {
        let body = ApiError::document_not_found().to_error_response();
        assert_eq!(body.error, "not_found");
        assert_eq!(body.reason, "document not found");
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::Upstream("timeout".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
