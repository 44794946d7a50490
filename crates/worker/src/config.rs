use std::path::PathBuf;

use mjrelay_core::config::env_or;
use mjrelay_core::error::CoreError;
use mjrelay_midjourney::PollConfig;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory the notify receiver writes job records into.
    pub record_dir: PathBuf,
    /// Base URL of the Midjourney proxy.
    pub mj_api_url: String,
    /// Chat bridge webhook; when unset, messages are only logged.
    pub delivery_webhook_url: Option<String>,
    pub poll: PollConfig,
}

impl WorkerConfig {
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `RECORD_DIR`           | `./data/job-records`     |
    /// | `MJ_API_URL`           | `http://127.0.0.1:8080`  |
    /// | `DELIVERY_WEBHOOK_URL` | unset                    |
    ///
    /// Polling settings come from [`PollConfig::from_env`].
    pub fn from_env() -> Result<Self, CoreError> {
        let delivery_webhook_url = std::env::var("DELIVERY_WEBHOOK_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            record_dir: PathBuf::from(env_or("RECORD_DIR", "./data/job-records")),
            mj_api_url: env_or("MJ_API_URL", "http://127.0.0.1:8080"),
            delivery_webhook_url,
            poll: PollConfig::from_env()?,
        })
    }
}
