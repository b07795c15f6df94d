// API error taxonomy and the unified HTTP error envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use recon_store::error::StoreError;
use thiserror::Error;

/// Errors surfaced to HTTP callers. Everything serializes to the
/// `{success:false, error, timestamp}` envelope.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InvalidState(msg) => {
                (StatusCode::BAD_REQUEST, format!("Invalid state: {msg}"))
            }
            ApiError::NotFound(kind, id) => {
                (StatusCode::NOT_FOUND, format!("{kind} not found: {id}"))
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (
            status,
            Json(serde_json::json!({
                "success": false,
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(kind, id) => ApiError::NotFound(kind, id),
            StoreError::BadCursor(msg) => ApiError::BadRequest(format!("Invalid cursor: {msg}")),
            StoreError::InvalidState(msg) => ApiError::InvalidState(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Worker-plane errors. A fatal CSV header problem fails the batch; store
/// and I/O errors propagate to the queue, which may redeliver the job.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("CSV parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: ApiError = StoreError::NotFound("batch", "abc".to_string()).into();
        assert!(matches!(err, ApiError::NotFound("batch", _)));

        let err: ApiError = StoreError::BadCursor("not base64url".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
