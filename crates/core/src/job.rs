//! Job status pushes and their normalized snapshot form.
//!
//! The image backend pushes free-form JSON status updates. [`JobPush`] is
//! the wire shape (persisted verbatim by the notify receiver) and
//! [`JobRecord`] is the normalized view the poller reasons about.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Number of prompt characters quoted in progress messages.
pub const PROMPT_EXCERPT_CHARS: usize = 10;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a backend job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Success,
    Failure,
}

impl JobStatus {
    /// Normalize a raw transport status.
    ///
    /// Matching is case-insensitive. Unknown values are treated as
    /// [`JobStatus::InProgress`] so that an unexpected status never ends a
    /// job early.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "NOT_START" | "SUBMITTED" => Self::Pending,
            "SUCCESS" => Self::Success,
            "FAILURE" | "FAILED" => Self::Failure,
            _ => Self::InProgress,
        }
    }

    /// `true` for SUCCESS and FAILURE.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

// ---------------------------------------------------------------------------
// JobAction
// ---------------------------------------------------------------------------

/// The kind of operation a job performs.
///
/// Terminal handling differs by kind: [`JobAction::Describe`] yields text,
/// every other kind yields an image URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAction {
    Generate,
    Describe,
    Upscale,
    Variation,
    Reroll,
    Blend,
    Change,
}

impl JobAction {
    /// Normalize a raw transport action. The backend calls generation
    /// `IMAGINE`; unknown values default to [`JobAction::Generate`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DESCRIBE" => Self::Describe,
            "UPSCALE" => Self::Upscale,
            "VARIATION" => Self::Variation,
            "REROLL" => Self::Reroll,
            "BLEND" => Self::Blend,
            "CHANGE" | "SIMPLE_CHANGE" => Self::Change,
            _ => Self::Generate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "GENERATE",
            Self::Describe => "DESCRIBE",
            Self::Upscale => "UPSCALE",
            Self::Variation => "VARIATION",
            Self::Reroll => "REROLL",
            Self::Blend => "BLEND",
            Self::Change => "CHANGE",
        }
    }
}

// ---------------------------------------------------------------------------
// JobPush (wire form)
// ---------------------------------------------------------------------------

/// A status push as delivered by the image backend.
///
/// Only `id` and `status` are required. Unknown fields are kept in
/// [`extra`](Self::extra) so the record round-trips without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPush {
    pub id: JobId,
    pub status: String,
    /// Usually a string such as `"15%"`; some backends send a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobPush {
    /// Create a push carrying only the required fields.
    pub fn new(id: impl Into<JobId>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            progress: None,
            action: None,
            prompt: None,
            prompt_en: None,
            description: None,
            image_url: None,
            fail_reason: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Parse a push from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn with_progress(mut self, progress: impl Into<String>) -> Self {
        self.progress = Some(serde_json::Value::String(progress.into()));
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_fail_reason(mut self, reason: impl Into<String>) -> Self {
        self.fail_reason = Some(reason.into());
        self
    }
}

/// Interpret an untrusted progress value as a percentage.
///
/// Accepts `"15%"`, `"15"` and JSON numbers. Out-of-range values are
/// clamped to `0..=100`; anything unparseable yields `0`.
pub fn parse_progress(value: Option<&serde_json::Value>) -> u8 {
    let parsed = match value {
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        _ => None,
    };

    match parsed {
        Some(p) if p.is_finite() => p.clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// JobRecord (normalized form)
// ---------------------------------------------------------------------------

/// Normalized snapshot of a job as last pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub action: JobAction,
    pub prompt_excerpt: Option<String>,
    /// Set only once the job is terminal.
    pub result_url: Option<String>,
    /// Description text; set only for a successful DESCRIBE job.
    pub result_text: Option<String>,
    /// Set only when the job failed.
    pub fail_reason: Option<String>,
}

impl JobRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl From<&JobPush> for JobRecord {
    fn from(push: &JobPush) -> Self {
        let status = JobStatus::parse(&push.status);
        let action = push
            .action
            .as_deref()
            .map(JobAction::parse)
            .unwrap_or(JobAction::Generate);

        let prompt_excerpt = push
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.chars().take(PROMPT_EXCERPT_CHARS).collect());

        let non_empty = |s: &Option<String>| s.clone().filter(|v| !v.trim().is_empty());

        let (result_url, result_text, fail_reason) = match status {
            JobStatus::Success => {
                // The backend reports describe output in the prompt field.
                let text = if action == JobAction::Describe {
                    non_empty(&push.prompt).or_else(|| non_empty(&push.description))
                } else {
                    None
                };
                (non_empty(&push.image_url), text, None)
            }
            JobStatus::Failure => (
                None,
                None,
                non_empty(&push.fail_reason).or_else(|| non_empty(&push.description)),
            ),
            JobStatus::Pending | JobStatus::InProgress => (None, None, None),
        };

        Self {
            job_id: push.id.clone(),
            status,
            progress_percent: parse_progress(push.progress.as_ref()),
            action,
            prompt_excerpt,
            result_url,
            result_text,
            fail_reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_normalization_is_case_insensitive() {
        assert_eq!(JobStatus::parse("success"), JobStatus::Success);
        assert_eq!(JobStatus::parse("FAILURE"), JobStatus::Failure);
        assert_eq!(JobStatus::parse("NOT_START"), JobStatus::Pending);
        assert_eq!(JobStatus::parse("SUBMITTED"), JobStatus::Pending);
        assert_eq!(JobStatus::parse("in_progress"), JobStatus::InProgress);
    }

    #[test]
    fn unknown_status_is_in_progress() {
        assert_eq!(JobStatus::parse("MODAL"), JobStatus::InProgress);
        assert_eq!(JobStatus::parse(""), JobStatus::InProgress);
    }

    #[test]
    fn imagine_maps_to_generate() {
        assert_eq!(JobAction::parse("IMAGINE"), JobAction::Generate);
        assert_eq!(JobAction::parse("describe"), JobAction::Describe);
        assert_eq!(JobAction::parse("whatever"), JobAction::Generate);
    }

    #[test]
    fn progress_parses_percent_strings() {
        assert_eq!(parse_progress(Some(&json!("15%"))), 15);
        assert_eq!(parse_progress(Some(&json!(" 100% "))), 100);
        assert_eq!(parse_progress(Some(&json!("42"))), 42);
        assert_eq!(parse_progress(Some(&json!(73))), 73);
    }

    #[test]
    fn progress_clamps_and_defaults() {
        assert_eq!(parse_progress(Some(&json!("250%"))), 100);
        assert_eq!(parse_progress(Some(&json!(-5))), 0);
        assert_eq!(parse_progress(Some(&json!("abc"))), 0);
        assert_eq!(parse_progress(Some(&json!(null))), 0);
        assert_eq!(parse_progress(None), 0);
    }

    #[test]
    fn push_keeps_unknown_fields() {
        let raw = br#"{"id":"42","status":"IN_PROGRESS","progress":"15%","submitTime":1700000000}"#;
        let push = JobPush::from_slice(raw).unwrap();
        assert_eq!(push.id, "42");
        assert_eq!(push.extra["submitTime"], 1700000000);
    }

    #[test]
    fn push_without_status_is_rejected() {
        assert!(JobPush::from_slice(br#"{"id":"42"}"#).is_err());
    }

    #[test]
    fn in_progress_record_has_no_results() {
        let push = JobPush::new("42", "IN_PROGRESS")
            .with_progress("55%")
            .with_prompt("a lighthouse at dusk, oil painting")
            .with_image_url("http://x/partial.png");
        let record = JobRecord::from(&push);

        assert_eq!(record.progress_percent, 55);
        assert_eq!(record.prompt_excerpt.as_deref(), Some("a lighthou"));
        assert!(record.result_url.is_none());
        assert!(!record.is_terminal());
    }

    #[test]
    fn describe_success_carries_text() {
        let push = JobPush::new("7", "SUCCESS")
            .with_action("DESCRIBE")
            .with_prompt("1. a red fox in snow --ar 1:1")
            .with_image_url("http://x/source.png");
        let record = JobRecord::from(&push);

        assert_eq!(record.action, JobAction::Describe);
        assert_eq!(record.result_text.as_deref(), Some("1. a red fox in snow --ar 1:1"));
        assert_eq!(record.result_url.as_deref(), Some("http://x/source.png"));
    }

    #[test]
    fn failure_falls_back_to_description() {
        let mut push = JobPush::new("9", "FAILURE");
        push.description = Some("banned prompt".into());
        let record = JobRecord::from(&push);

        assert_eq!(record.fail_reason.as_deref(), Some("banned prompt"));
        assert!(record.result_url.is_none());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let push = JobPush::new("1", "IN_PROGRESS").with_prompt("一只在雪地里奔跑的红色狐狸，油画风格");
        let record = JobRecord::from(&push);
        assert_eq!(record.prompt_excerpt.map(|e| e.chars().count()), Some(10));
    }
}
