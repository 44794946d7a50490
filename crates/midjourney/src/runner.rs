//! Submit-poll-deliver orchestration for one user request.
//!
//! [`JobRunner::run`] submits a job to the proxy, follows it through the
//! [`JobPoller`] and pushes the final message to the user's notifier.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mjrelay_core::job_events::{
    failure_text, missing_result_text, timeout_text, MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED,
    MSG_TYPE_JOB_INFO, MSG_TYPE_JOB_TIMED_OUT, TRANSLATING_NOTICE,
};
use mjrelay_core::outcome::{JobOutcome, JobResult};
use mjrelay_events::{AddressedNotifier, JobNotification, Notifier};

use crate::api::{MjApi, SubmitError, SubmitRequest, Submission};
use crate::poller::JobPoller;
use crate::translator::Translator;

/// One user request: what to submit and where to report.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub submit: SubmitRequest,
    /// Chat recipient stamped onto every notification.
    pub recipient: Option<String>,
}

pub struct JobRunner {
    api: MjApi,
    poller: JobPoller,
    notifier: Arc<dyn Notifier>,
    translator: Arc<dyn Translator>,
}

impl JobRunner {
    pub fn new(
        api: MjApi,
        poller: JobPoller,
        notifier: Arc<dyn Notifier>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            api,
            poller,
            notifier,
            translator,
        }
    }

    /// Submit `request` and follow it to its end.
    pub async fn run(&self, request: JobRequest, cancel: &CancellationToken) -> JobOutcome {
        let submitted = match self.api.submit(&request.submit).await {
            Ok(response) => response.into_submission(),
            Err(e) => Err(SubmitError::from(e)),
        };
        self.follow(submitted, request.recipient, cancel).await
    }

    /// Follow an already-answered submission: poll when queued, then
    /// deliver the outcome.
    pub async fn follow(
        &self,
        submitted: Result<Submission, SubmitError>,
        recipient: Option<String>,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let notifier = AddressedNotifier::new(self.notifier.as_ref(), recipient);

        let outcome = match submitted {
            Ok(Submission::Queued { job_id }) => {
                tracing::info!(job_id = %job_id, "Job queued");
                self.poller.poll(&job_id, &notifier, cancel).await
            }
            Ok(Submission::AlreadyComplete { job_id, image_url }) => {
                tracing::info!(job_id = ?job_id, "Job answered without polling");
                JobOutcome::Succeeded {
                    job_id,
                    result: JobResult::Image { url: image_url },
                }
            }
            Err(e) => {
                tracing::warn!(job_id = ?e.job_id(), error = %e, "Job submission failed");
                if let Some(job_id) = e.job_id() {
                    if let Err(err) = self.poller.store().delete(job_id).await {
                        tracing::debug!(job_id = %job_id, error = %err, "No record removed");
                    }
                }
                JobOutcome::Rejected {
                    job_id: e.job_id().map(str::to_string),
                    reason: e.reason(),
                }
            }
        };

        self.deliver(&outcome, &notifier).await;
        outcome
    }

    async fn deliver(&self, outcome: &JobOutcome, notifier: &dyn Notifier) {
        match outcome {
            JobOutcome::Succeeded {
                job_id,
                result: JobResult::Image { url: Some(url) },
            } => {
                let notification = JobNotification::new(MSG_TYPE_JOB_COMPLETED, url.clone())
                    .with_payload(serde_json::json!({ "image_url": url }));
                send(notifier, tagged(notification, job_id.as_deref())).await;
            }
            JobOutcome::Succeeded {
                job_id,
                result: JobResult::Image { url: None },
            } => {
                let notification =
                    JobNotification::new(MSG_TYPE_JOB_FAILED, missing_result_text(job_id.as_deref()));
                send(notifier, tagged(notification, job_id.as_deref())).await;
            }
            JobOutcome::Succeeded {
                job_id,
                result: JobResult::Description { text, image_url },
            } => {
                let job_id = job_id.as_deref();
                if let Some(url) = image_url {
                    let notification = JobNotification::new(MSG_TYPE_JOB_COMPLETED, url.clone())
                        .with_payload(serde_json::json!({ "image_url": url }));
                    send(notifier, tagged(notification, job_id)).await;
                }
                send(
                    notifier,
                    tagged(JobNotification::new(MSG_TYPE_JOB_COMPLETED, text.clone()), job_id),
                )
                .await;
                send(
                    notifier,
                    tagged(JobNotification::new(MSG_TYPE_JOB_INFO, TRANSLATING_NOTICE), job_id),
                )
                .await;
                let translated = self.translate_or_original(job_id, text).await;
                let notification = JobNotification::new(MSG_TYPE_JOB_COMPLETED, translated)
                    .with_payload(serde_json::json!({ "translated": true }));
                send(notifier, tagged(notification, job_id)).await;
            }
            JobOutcome::Failed { job_id, reason } => {
                send(
                    notifier,
                    JobNotification::new(MSG_TYPE_JOB_FAILED, failure_text(Some(job_id), reason))
                        .with_job(job_id.clone()),
                )
                .await;
            }
            JobOutcome::Rejected { job_id, reason } => {
                let notification =
                    JobNotification::new(MSG_TYPE_JOB_FAILED, failure_text(job_id.as_deref(), reason));
                send(notifier, tagged(notification, job_id.as_deref())).await;
            }
            JobOutcome::TimedOut { job_id, waited } => {
                send(
                    notifier,
                    JobNotification::new(MSG_TYPE_JOB_TIMED_OUT, timeout_text(job_id, *waited))
                        .with_job(job_id.clone()),
                )
                .await;
            }
            JobOutcome::Cancelled { job_id } => {
                tracing::debug!(job_id = %job_id, "Cancelled job, nothing to deliver");
            }
        }
    }

    /// Empty or failed translations fall back to the original text.
    async fn translate_or_original(&self, job_id: Option<&str>, text: &str) -> String {
        match self.translator.translate(text).await {
            Ok(translated) if !translated.trim().is_empty() => translated,
            Ok(_) => text.to_string(),
            Err(e) => {
                tracing::warn!(job_id = ?job_id, error = %e, "Translation failed, sending original text");
                text.to_string()
            }
        }
    }
}

fn tagged(notification: JobNotification, job_id: Option<&str>) -> JobNotification {
    match job_id {
        Some(id) => notification.with_job(id),
        None => notification,
    }
}

async fn send(notifier: &dyn Notifier, notification: JobNotification) {
    let job_id = notification.job_id.clone();
    if let Err(e) = notifier.notify(notification).await {
        tracing::warn!(job_id = ?job_id, error = %e, "Notification not delivered");
    }
}
