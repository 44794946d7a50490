use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use mjrelay_store::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent
/// `{ "error": ..., "code": ... }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request body is not an acceptable job push.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Store(StoreError::InvalidJobId(id)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_JOB_ID",
                format!("Job id '{id}' is not allowed"),
            ),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Job record store error");
                internal()
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                msg.clone(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
