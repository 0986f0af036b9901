//! HTTP error mapping
//!
//! Engine errors carry the taxonomy; this layer only decides status codes
//! and the JSON body shape. Internal store details never reach the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use donorbase_common::Error;
use serde_json::json;
use thiserror::Error as ThisError;
use tracing::error;

/// API error wrapper
#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] Error),

    /// Malformed request outside the engine's taxonomy
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, extra) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Engine(err) => match err {
                Error::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), None)
                }
                Error::AmbiguousMatch { ref candidates, .. } => {
                    let extra = Some(json!({ "candidates": candidates }));
                    (
                        StatusCode::CONFLICT,
                        "AMBIGUOUS_MATCH",
                        err.to_string(),
                        extra,
                    )
                }
                Error::InvalidStage(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_STAGE", err.to_string(), None)
                }
                Error::InvalidDate(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_DATE", err.to_string(), None)
                }
                Error::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", err.to_string(), None)
                }
                Error::AlreadyExists(_) => {
                    (StatusCode::CONFLICT, "ALREADY_EXISTS", err.to_string(), None)
                }
                Error::ConcurrentModification(_) => (
                    StatusCode::CONFLICT,
                    "CONCURRENT_MODIFICATION",
                    err.to_string(),
                    None,
                ),
                Error::StoreUnavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "Record store is temporarily unavailable".to_string(),
                    None,
                ),
                other => {
                    // Log the detail, return a generic message
                    error!("Internal error serving request: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Internal server error".to_string(),
                        None,
                    )
                }
            },
        };

        let mut error_body = serde_json::Map::new();
        error_body.insert("code".to_string(), json!(code));
        error_body.insert("message".to_string(), json!(message));
        if let Some(serde_json::Value::Object(extra)) = extra {
            error_body.extend(extra);
        }

        (status, Json(json!({ "error": error_body }))).into_response()
    }
}
