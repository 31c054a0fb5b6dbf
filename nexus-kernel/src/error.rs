use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Startup configuration problems. These are the only errors that stop the
/// kernel; everything past startup degrades instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} {reason}")]
    OutOfRange { key: &'static str, reason: &'static str },

    #[error("home directory unavailable, set LOG_PATH explicitly")]
    NoHomeDir,
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("log scan task failed: {0}")]
    Scan(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match self {
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Scan(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(serde_json::json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}
