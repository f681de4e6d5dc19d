//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Internal(colloquy_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Monthly quota denial. Carries the start of the next billing period.
    TooManyRequests {
        message: String,
        reset_time: Option<DateTime<Utc>>,
    },
    /// Every candidate model failed.
    BadGateway(String),
}

impl From<colloquy_core::Error> for ApiError {
    fn from(err: colloquy_core::Error) -> Self {
        use colloquy_core::Error;
        if let Error::Database(sqlx_err) = &err {
            let msg = sqlx_err.to_string();
            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                return ApiError::Conflict(msg);
            }
        }
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::TaskNotFound(id) => ApiError::NotFound(format!("task {}", id)),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NoCompatibleModel(msg) => ApiError::BadRequest(msg),
            Error::InvalidTransition(msg) => ApiError::Conflict(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::QuotaExceeded(message) => ApiError::TooManyRequests {
                message,
                reset_time: None,
            },
            Error::Provider(msg) => ApiError::BadGateway(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": err.to_string() }),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, serde_json::json!({ "error": msg })),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            ApiError::TooManyRequests { message, reset_time } => (
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({
                    "error": "Rate limit exceeded",
                    "message": message,
                    "resetTime": reset_time,
                }),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, serde_json::json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}
