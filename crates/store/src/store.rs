//! File-backed job record store.
//!
//! One record per job id lives at `{root}/job-record-{id}.json` and holds
//! the verbatim pushed payload. Every operation on an id runs under that
//! id's [`RecordLock`]; writes go to a temp file and are renamed into place
//! so a reader only ever sees a complete prior or complete new record.
//!
//! File work is blocking and runs on `tokio::task::spawn_blocking`. No lock
//! is held across an `.await`, so cancelling a caller never leaves a record
//! locked.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mjrelay_core::job::{JobPush, JobRecord};

use crate::error::StoreError;
use crate::lock::RecordLock;

/// File name prefix shared by records and their lock files.
pub const RECORD_PREFIX: &str = "job-record-";

/// Longest job id accepted as a file name component.
const MAX_JOB_ID_LEN: usize = 128;

/// A successfully parsed record together with the bytes it was read from.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub raw: Vec<u8>,
    pub push: JobPush,
    pub record: JobRecord,
}

/// Result of reading a record.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Found(JobSnapshot),
    /// Nothing has been pushed for this id yet (or it was already cleared).
    NotFound,
    /// The stored content does not parse. Carries a zero progress default
    /// so callers can keep going.
    Corrupt {
        raw: Vec<u8>,
        error: String,
        progress_percent: u8,
    },
}

impl ReadOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn record(&self) -> Option<&JobRecord> {
        match self {
            Self::Found(snapshot) => Some(&snapshot.record),
            _ => None,
        }
    }
}

/// Durable, per-id locked store of job records.
///
/// Cheap to clone; clones share the same root directory.
#[derive(Debug, Clone)]
pub struct JobRecordStore {
    root: Arc<PathBuf>,
}

/// Resolved file locations for one job id.
#[derive(Debug, Clone)]
struct RecordPaths {
    dir: PathBuf,
    record: PathBuf,
    lock: PathBuf,
    file_stem: String,
}

impl RecordPaths {
    fn temp(&self) -> PathBuf {
        self.dir
            .join(format!(".{}.json.tmp-{}", self.file_stem, uuid::Uuid::new_v4()))
    }
}

impl JobRecordStore {
    /// Create a store rooted at `root` without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(root);
        fs::create_dir_all(store.root()).map_err(StoreError::io(store.root()))?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for `job_id`.
    pub fn record_path(&self, job_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.paths(job_id)?.record)
    }

    /// Serialize `push` and persist it under `job_id`, replacing any prior
    /// value.
    pub async fn write(&self, job_id: &str, push: &JobPush) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(push)?;
        self.write_raw(job_id, bytes).await
    }

    /// Persist `bytes` verbatim under `job_id`, replacing any prior value.
    pub async fn write_raw(&self, job_id: &str, bytes: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        let paths = self.paths(job_id)?;
        let bytes = bytes.into();
        run_blocking(move || write_blocking(&paths, &bytes)).await
    }

    /// Read and parse the record for `job_id`.
    pub async fn read(&self, job_id: &str) -> Result<ReadOutcome, StoreError> {
        let paths = self.paths(job_id)?;
        run_blocking(move || read_blocking(&paths, false)).await
    }

    /// Read the record for `job_id` and remove it under the same lock hold.
    pub async fn take(&self, job_id: &str) -> Result<ReadOutcome, StoreError> {
        let paths = self.paths(job_id)?;
        run_blocking(move || read_blocking(&paths, true)).await
    }

    /// Remove the record for `job_id`. Removing a missing record is not an
    /// error.
    pub async fn delete(&self, job_id: &str) -> Result<(), StoreError> {
        let paths = self.paths(job_id)?;
        run_blocking(move || delete_blocking(&paths)).await
    }

    pub async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        let paths = self.paths(job_id)?;
        run_blocking(move || Ok(paths.record.exists())).await
    }

    /// Create and remove a scratch file in the root directory.
    pub async fn check_writable(&self) -> Result<(), StoreError> {
        let scratch = self
            .root
            .join(format!(".write-check-{}", uuid::Uuid::new_v4()));
        run_blocking(move || {
            fs::write(&scratch, b"").map_err(StoreError::io(&scratch))?;
            remove_if_present(&scratch)
        })
        .await
    }

    fn paths(&self, job_id: &str) -> Result<RecordPaths, StoreError> {
        validate_job_id(job_id)?;
        let file_stem = format!("{RECORD_PREFIX}{job_id}");
        Ok(RecordPaths {
            dir: self.root.as_ref().clone(),
            record: self.root.join(format!("{file_stem}.json")),
            lock: self.root.join(format!("{file_stem}.lock")),
            file_stem,
        })
    }
}

/// Job ids become file names, so only a conservative character set is
/// accepted.
pub fn validate_job_id(job_id: &str) -> Result<(), StoreError> {
    let valid = !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidJobId(job_id.to_string()))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

// ---- blocking operations ----

fn write_blocking(paths: &RecordPaths, bytes: &[u8]) -> Result<(), StoreError> {
    fs::create_dir_all(&paths.dir).map_err(StoreError::io(&paths.dir))?;
    let _lock = RecordLock::acquire(&paths.lock).map_err(StoreError::io(&paths.lock))?;

    let temp = paths.temp();
    let written = fs::File::create(&temp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&temp, &paths.record)) {
        let _ = fs::remove_file(&temp);
        return Err(StoreError::Io {
            path: paths.record.clone(),
            source: e,
        });
    }

    tracing::debug!(path = %paths.record.display(), bytes = bytes.len(), "Job record written");
    Ok(())
}

fn read_blocking(paths: &RecordPaths, clear: bool) -> Result<ReadOutcome, StoreError> {
    // Records appear by rename, so a missing file is a clean answer and
    // there is no point creating a lock file for it.
    if !paths.record.exists() {
        return Ok(ReadOutcome::NotFound);
    }

    let lock = RecordLock::acquire(&paths.lock).map_err(StoreError::io(&paths.lock))?;

    let raw = match fs::read(&paths.record) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Deleted while we waited for the lock.
            lock.unlink().map_err(StoreError::io(&paths.lock))?;
            return Ok(ReadOutcome::NotFound);
        }
        Err(e) => return Err(StoreError::io(&paths.record)(e)),
    };

    if clear {
        remove_if_present(&paths.record)?;
        lock.unlink().map_err(StoreError::io(&paths.lock))?;
    }

    Ok(parse_record(raw))
}

fn delete_blocking(paths: &RecordPaths) -> Result<(), StoreError> {
    if !paths.record.exists() && !paths.lock.exists() {
        return Ok(());
    }

    let lock = RecordLock::acquire(&paths.lock).map_err(StoreError::io(&paths.lock))?;
    remove_if_present(&paths.record)?;
    lock.unlink().map_err(StoreError::io(&paths.lock))?;

    tracing::debug!(path = %paths.record.display(), "Job record deleted");
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path)(e)),
    }
}

fn parse_record(raw: Vec<u8>) -> ReadOutcome {
    match JobPush::from_slice(&raw) {
        Ok(push) => {
            let record = JobRecord::from(&push);
            ReadOutcome::Found(JobSnapshot { raw, push, record })
        }
        Err(e) => ReadOutcome::Corrupt {
            raw,
            error: e.to_string(),
            progress_percent: 0,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
