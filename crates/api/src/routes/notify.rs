//! Route definitions for the job push receiver.
//!
//! ```text
//! GET  /notify   liveness text
//! POST /notify   store a job status push
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::notify;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/notify", get(notify::liveness).post(notify::receive_push))
}
