//! Durable job record store shared by the notify receiver (writer) and the
//! job pollers (readers).
//!
//! - [`JobRecordStore`]: one file per job id, per-id exclusive locking,
//!   atomic replace-on-write.
//! - [`ReadOutcome`]: found / not yet pushed / unparseable.

mod error;
mod lock;
mod store;

pub use error::StoreError;
pub use store::{validate_job_id, JobRecordStore, JobSnapshot, ReadOutcome, RECORD_PREFIX};
