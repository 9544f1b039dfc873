//! Stub host error types.
//!
//! All errors map to 400 Bad Request with a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StubError {
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let code = match &self {
            StubError::InvalidStatus(_) => "INVALID_STATUS",
            StubError::InvalidBody(_) => "INVALID_BODY",
        };

        tracing::debug!(target: "func.stub", error = %self, "Rejecting request");

        let body = ErrorResponse {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
