use std::path::PathBuf;

/// Errors from the job record store.
///
/// A missing or unparseable record is not an error; see
/// [`ReadOutcome`](crate::ReadOutcome).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The job id cannot be mapped safely onto a file name.
    #[error("Invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The blocking worker running the file operation panicked or was
    /// cancelled.
    #[error("Store task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
