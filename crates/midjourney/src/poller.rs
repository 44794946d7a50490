//! Timer-driven polling of the job record store.
//!
//! [`JobPoller::poll`] reads the record for one job on every tick, feeds it
//! to a [`JobProgressTracker`], forwards progress notices, and finishes on a
//! terminal state, the deadline, or cancellation. Whatever the ending, the
//! record is removed so it never outlives the job.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use mjrelay_core::config::env_parse;
use mjrelay_core::error::CoreError;
use mjrelay_core::job_events::MSG_TYPE_JOB_PROGRESS;
use mjrelay_core::outcome::JobOutcome;
use mjrelay_events::{JobNotification, Notifier};
use mjrelay_store::{JobRecordStore, ReadOutcome};

use crate::tracker::{BandPolicy, JobProgressTracker, Observation, ProgressNotice, PROGRESS_BANDS_ENV};

/// Default delay between reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time to wait for a terminal state.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(180);

/// Progress notices waiting for the notifier. A job produces at most one
/// per band.
const PROGRESS_QUEUE_DEPTH: usize = 8;

/// Polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub bands: BandPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            bands: BandPolicy::default(),
        }
    }
}

impl PollConfig {
    /// Load from `POLL_INTERVAL_MS`, `POLL_TIMEOUT_SECS` and
    /// `PROGRESS_BANDS`, using the defaults for unset variables.
    pub fn from_env() -> Result<Self, CoreError> {
        let interval_ms: u64 = env_parse("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64)?;
        let timeout_secs: u64 = env_parse("POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT.as_secs())?;

        if interval_ms == 0 {
            return Err(CoreError::Config {
                key: "POLL_INTERVAL_MS",
                message: "must be greater than zero".into(),
            });
        }

        let bands = match std::env::var(PROGRESS_BANDS_ENV) {
            Ok(raw) => raw.parse::<BandPolicy>()?,
            Err(_) => BandPolicy::default(),
        };

        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_secs(timeout_secs),
            bands,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Follows jobs through the record store until they finish.
#[derive(Debug, Clone)]
pub struct JobPoller {
    store: JobRecordStore,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(store: JobRecordStore, config: PollConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &JobRecordStore {
        &self.store
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `job_id` until it reaches a terminal state, times out, or
    /// `cancel` fires.
    ///
    /// Missing and unparseable records are expected while the job runs and
    /// only delay the outcome. Progress notices are delivered alongside the
    /// tick loop, so a slow notifier never holds up the deadline or
    /// cancellation. Notices still undelivered when the job ends are
    /// dropped. Notifier failures are logged and ignored.
    pub async fn poll(
        &self,
        job_id: &str,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let (tx, mut rx) = mpsc::channel::<ProgressNotice>(PROGRESS_QUEUE_DEPTH);

        let deliveries = async move {
            while let Some(notice) = rx.recv().await {
                send_progress(notifier, &notice).await;
            }
        };
        let tracking = self.track(job_id, tx, cancel);
        tokio::pin!(deliveries, tracking);

        tokio::select! {
            outcome = &mut tracking => outcome,
            () = &mut deliveries => tracking.await,
        }
    }

    async fn track(
        &self,
        job_id: &str,
        notices: mpsc::Sender<ProgressNotice>,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let mut tracker = JobProgressTracker::new(job_id, self.config.bands.clone());
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            job_id = %job_id,
            interval_ms = self.config.interval.as_millis() as u64,
            timeout_secs = self.config.timeout.as_secs(),
            "Polling job"
        );

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(job_id).await,
                read = async {
                    ticker.tick().await;
                    self.store.read(job_id).await
                } => read,
            };

            match read {
                Ok(ReadOutcome::Found(snapshot)) => match tracker.observe(&snapshot.record) {
                    Observation::Continue { notice } => {
                        if let Some(notice) = notice {
                            if let Err(e) = notices.try_send(notice) {
                                tracing::warn!(job_id = %job_id, error = %e, "Progress notice dropped");
                            }
                        }
                    }
                    Observation::Terminal { outcome } => {
                        self.discard(job_id).await;
                        if let Some(outcome) = outcome {
                            tracing::info!(job_id = %job_id, success = outcome.is_success(), "Job finished");
                            return outcome;
                        }
                    }
                },
                Ok(ReadOutcome::NotFound) => {
                    tracing::trace!(job_id = %job_id, "No record yet");
                }
                Ok(ReadOutcome::Corrupt { error, .. }) => {
                    tracing::warn!(job_id = %job_id, error = %error, "Unreadable job record, will retry");
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Job record read failed, will retry");
                }
            }

            let waited = tracker.elapsed();
            if waited >= self.config.timeout {
                tracing::warn!(
                    job_id = %job_id,
                    waited_secs = waited.as_secs(),
                    "Job timed out, abandoning"
                );
                self.discard(job_id).await;
                return JobOutcome::TimedOut {
                    job_id: job_id.to_string(),
                    waited,
                };
            }
        }
    }

    async fn cancelled(&self, job_id: &str) -> JobOutcome {
        tracing::info!(job_id = %job_id, "Polling cancelled");
        self.discard(job_id).await;
        JobOutcome::Cancelled {
            job_id: job_id.to_string(),
        }
    }

    /// Best-effort record removal.
    async fn discard(&self, job_id: &str) {
        if let Err(e) = self.store.delete(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to delete job record");
        }
    }
}

async fn send_progress(notifier: &dyn Notifier, notice: &ProgressNotice) {
    let notification = JobNotification::new(MSG_TYPE_JOB_PROGRESS, notice.to_string())
        .with_job(notice.job_id.clone())
        .with_payload(serde_json::json!({
            "band": notice.band,
            "percent": notice.percent,
        }));

    if let Err(e) = notifier.notify(notification).await {
        tracing::warn!(job_id = %notice.job_id, error = %e, "Progress notification not delivered");
    }
}
