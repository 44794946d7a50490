//! Handlers for the job push receiver.
//!
//! The image backend POSTs a JSON status update for a job whenever its
//! state changes. Each valid push is persisted verbatim, replacing the
//! previous snapshot for that job id.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::Json;

use mjrelay_core::job::JobPush;

use crate::error::{AppError, AppResult};
use crate::response::AckResponse;
use crate::state::AppState;

/// Acknowledgement text expected by push senders.
pub const ACK_MESSAGE: &str = "JSON data received";

/// Body of `GET /notify`.
pub const LIVENESS_TEXT: &str = "mjrelay notify receiver is running";

/// POST /notify
///
/// Validates the push and stores it under its id. The raw body is what
/// gets stored, not a re-serialization.
pub async fn receive_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<AckResponse<serde_json::Value>>> {
    require_json(&headers)?;

    let data: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed JSON: {e}")))?;
    let push: JobPush = serde_json::from_value(data.clone())
        .map_err(|e| AppError::BadRequest(format!("Not a job push: {e}")))?;

    state.store.write_raw(&push.id, body.to_vec()).await?;

    tracing::info!(
        job_id = %push.id,
        status = %push.status,
        bytes = body.len(),
        "Job push stored"
    );

    Ok(Json(AckResponse {
        message: ACK_MESSAGE,
        data,
    }))
}

/// GET /notify
pub async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

/// Accepts `application/json` with optional parameters such as a charset.
fn require_json(headers: &HeaderMap) -> Result<(), AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType(format!(
            "Expected application/json, got '{content_type}'"
        )))
    }
}
