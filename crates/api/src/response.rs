//! Shared response envelope types for API handlers.

use serde::Serialize;

/// Acknowledgement envelope: `{ "message": ..., "data": T }`.
///
/// Push senders expect their payload echoed back under `data`.
#[derive(Debug, Serialize)]
pub struct AckResponse<T: Serialize> {
    pub message: &'static str,
    pub data: T,
}
