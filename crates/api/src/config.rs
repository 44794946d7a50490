use std::path::PathBuf;

use mjrelay_core::config::{env_or, env_parse};
use mjrelay_core::error::CoreError;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `4120`).
    pub port: u16,
    /// Directory holding job records, shared with the workers.
    pub record_dir: PathBuf,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default               |
    /// |------------------------|-----------------------|
    /// | `HOST`                 | `0.0.0.0`             |
    /// | `PORT`                 | `4120`                |
    /// | `RECORD_DIR`           | `./data/job-records`  |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                  |
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 4120)?,
            record_dir: PathBuf::from(env_or("RECORD_DIR", "./data/job-records")),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30)?,
        })
    }
}
