//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Body shared by every non-200 response.
///
/// Errors carry `message`; guardrail rejections carry `reason`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No input provided")]
    NoInput,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Report could not be processed: {0}")]
    Unprocessed(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Upstream timeout: {0}")]
    Timeout(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoInput | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Unprocessed(reason) => ErrorBody {
                status: "unprocessed",
                message: None,
                reason: Some(reason),
            },
            ApiError::NoInput => error_body("No input provided".to_string()),
            ApiError::BadRequest(detail) => error_body(detail),
            ApiError::PayloadTooLarge { limit } => {
                error_body(format!("File too large. Maximum {limit} bytes."))
            }
            ApiError::Upstream(detail) => {
                tracing::error!(detail = %detail, "Upstream engine failure");
                error_body(detail)
            }
            ApiError::Timeout(detail) => {
                tracing::warn!(detail = %detail, "Upstream engine timeout");
                error_body(detail)
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(message: String) -> ErrorBody {
    ErrorBody {
        status: "error",
        message: Some(message),
        reason: None,
    }
}
