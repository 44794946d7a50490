use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether a file can be created in the record directory.
    pub store_writable: bool,
}

/// GET /health -- returns service and record store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_writable = match state.store.check_writable().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Record store is not writable");
            false
        }
    };

    let status = if store_writable { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store_writable,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
