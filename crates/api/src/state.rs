use std::sync::Arc;

use mjrelay_store::JobRecordStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Durable job records, read by the workers.
    pub store: JobRecordStore,
    pub config: Arc<ServerConfig>,
}
