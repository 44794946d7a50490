//! Midjourney job handling: proxy submission, progress tracking, polling
//! and final delivery.
//!
//! - [`api`]: REST client for the proxy's `/mj/submit/*` endpoints.
//! - [`tracker`]: per-job progress band state machine.
//! - [`poller`]: timer loop over the job record store.
//! - [`translator`]: translation seam for DESCRIBE results.
//! - [`runner`]: submit, poll, deliver.

pub mod api;
pub mod poller;
pub mod runner;
pub mod tracker;
pub mod translator;

pub use api::{MjApi, MjApiError, SubmitError, SubmitRequest, SubmitResponse, Submission};
pub use poller::{JobPoller, PollConfig};
pub use runner::{JobRequest, JobRunner};
pub use tracker::{BandPolicy, JobProgressTracker, Observation, ProgressBand, ProgressNotice};
pub use translator::{PassthroughTranslator, TranslateError, Translator};
