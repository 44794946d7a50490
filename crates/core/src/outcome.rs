//! Caller-visible results of a tracked job.

use std::time::Duration;

use serde::Serialize;

use crate::types::JobId;

/// Payload of a successfully completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    /// An image-producing job finished.
    Image { url: Option<String> },
    /// A DESCRIBE job finished. The text still needs translating before it
    /// is delivered to the user.
    Description {
        text: String,
        image_url: Option<String>,
    },
}

/// How a job ended, from the caller's point of view.
///
/// [`JobOutcome::TimedOut`] and [`JobOutcome::Cancelled`] are ordinary
/// outcomes, not errors: the caller is expected to tell the user that no
/// result arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// `job_id` is absent only when the proxy answered a submission with a
    /// cached result and no task id.
    Succeeded {
        job_id: Option<JobId>,
        result: JobResult,
    },
    Failed { job_id: JobId, reason: String },
    /// The submission itself was refused; no polling took place.
    Rejected {
        job_id: Option<JobId>,
        reason: String,
    },
    TimedOut {
        job_id: JobId,
        #[serde(with = "duration_secs")]
        waited: Duration,
    },
    Cancelled { job_id: JobId },
}

impl JobOutcome {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Failed { job_id, .. }
            | Self::TimedOut { job_id, .. }
            | Self::Cancelled { job_id } => Some(job_id),
            Self::Succeeded { job_id, .. } | Self::Rejected { job_id, .. } => job_id.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_without_id_has_no_job_id() {
        let outcome = JobOutcome::Rejected {
            job_id: None,
            reason: "queue full".into(),
        };
        assert!(outcome.job_id().is_none());
        assert!(!outcome.is_success());
    }

    #[test]
    fn cached_success_without_id_serializes_null() {
        let outcome = JobOutcome::Succeeded {
            job_id: None,
            result: JobResult::Image {
                url: Some("http://x/cached.png".into()),
            },
        };
        assert!(outcome.is_success());
        assert!(outcome.job_id().is_none());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["job_id"], serde_json::Value::Null);
        assert_eq!(json["result"]["url"], "http://x/cached.png");
    }

    #[test]
    fn timed_out_serializes_seconds() {
        let outcome = JobOutcome::TimedOut {
            job_id: "42".into(),
            waited: Duration::from_secs(180),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "timed_out");
        assert_eq!(json["waited"], 180);
        assert_eq!(json["job_id"], "42");
    }
}
