//! Notification type constants and user-facing message text for job
//! lifecycle updates.
//!
//! Used by the poller and runner when pushing updates through a notifier.

use std::time::Duration;

/// Progress update during job execution.
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Job completed successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed, or the submission was refused.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// No terminal state arrived before the deadline.
pub const MSG_TYPE_JOB_TIMED_OUT: &str = "job_timed_out";

/// Informational text (e.g. "translating").
pub const MSG_TYPE_JOB_INFO: &str = "job_info";

/// Sent before a description is handed to the translator.
pub const TRANSLATING_NOTICE: &str = "Translating...";

/// `Task ID: 42 (a lighthou)... progress 15%`
pub fn progress_text(job_id: &str, prompt_excerpt: Option<&str>, percent: u8) -> String {
    match prompt_excerpt {
        Some(excerpt) => format!("Task ID: {job_id} ({excerpt})... progress {percent}%"),
        None => format!("Task ID: {job_id}... progress {percent}%"),
    }
}

pub fn failure_text(job_id: Option<&str>, reason: &str) -> String {
    match job_id {
        Some(id) => format!("Task ID: {id} image generation failed: {reason}"),
        None => format!("Image generation failed: {reason}"),
    }
}

pub fn missing_result_text(job_id: Option<&str>) -> String {
    match job_id {
        Some(id) => format!("Task ID: {id} finished without a result image"),
        None => "Image generation finished without a result image".to_string(),
    }
}

pub fn timeout_text(job_id: &str, waited: Duration) -> String {
    format!(
        "Task ID: {job_id} abandoned: no result within {} seconds",
        waited.as_secs()
    )
}
