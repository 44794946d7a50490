//! Per-job progress state machine.
//!
//! A [`JobProgressTracker`] consumes successive [`JobRecord`] snapshots and
//! decides which progress notices to send. Each band is announced at most
//! once, and the terminal outcome is reported exactly once.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tokio::time::{Duration, Instant};

use mjrelay_core::error::CoreError;
use mjrelay_core::job::{JobAction, JobRecord, JobStatus};
use mjrelay_core::job_events::progress_text;
use mjrelay_core::outcome::{JobOutcome, JobResult};
use mjrelay_core::types::JobId;

/// Environment variable holding the band thresholds.
pub const PROGRESS_BANDS_ENV: &str = "PROGRESS_BANDS";

/// Reason used when the backend reports a failure without saying why.
const UNKNOWN_FAILURE: &str = "unknown error";

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// A progress range announced at most once per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBand {
    /// Exactly 0%.
    Init,
    Low,
    Mid,
    High,
    Almost,
}

/// Open range `(lower, upper)`, optionally closed at `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRange {
    pub lower: u8,
    pub upper: u8,
    pub upper_inclusive: bool,
}

impl BandRange {
    pub const fn open(lower: u8, upper: u8) -> Self {
        Self {
            lower,
            upper,
            upper_inclusive: false,
        }
    }

    pub const fn closed_above(lower: u8, upper: u8) -> Self {
        Self {
            lower,
            upper,
            upper_inclusive: true,
        }
    }

    pub fn contains(&self, percent: u8) -> bool {
        percent > self.lower
            && (percent < self.upper || (self.upper_inclusive && percent == self.upper))
    }
}

/// Thresholds for the LOW, MID, HIGH and ALMOST bands.
///
/// Percentages between bands (by default 20-40, 50-60 and 80-90) belong to
/// no band and never trigger a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandPolicy {
    pub low: BandRange,
    pub mid: BandRange,
    pub high: BandRange,
    pub almost: BandRange,
}

impl Default for BandPolicy {
    fn default() -> Self {
        Self {
            low: BandRange::open(0, 20),
            mid: BandRange::open(40, 50),
            high: BandRange::open(60, 80),
            almost: BandRange::closed_above(90, 100),
        }
    }
}

impl BandPolicy {
    /// Band for `percent`, if any.
    pub fn classify(&self, percent: u8) -> Option<ProgressBand> {
        if percent == 0 {
            return Some(ProgressBand::Init);
        }
        [
            (ProgressBand::Low, self.low),
            (ProgressBand::Mid, self.mid),
            (ProgressBand::High, self.high),
            (ProgressBand::Almost, self.almost),
        ]
        .into_iter()
        .find(|(_, range)| range.contains(percent))
        .map(|(band, _)| band)
    }
}

/// Parses `"0:20,40:50,60:80,90:100"`: four `lower:upper` pairs for LOW,
/// MID, HIGH and ALMOST. Only ALMOST includes its upper bound.
impl FromStr for BandPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: String| CoreError::Config {
            key: PROGRESS_BANDS_ENV,
            message,
        };

        let pairs = s
            .split(',')
            .map(|pair| -> Result<(u8, u8), CoreError> {
                let (lower, upper) = pair
                    .trim()
                    .split_once(':')
                    .ok_or_else(|| invalid(format!("expected lower:upper, got '{pair}'")))?;
                let parse = |v: &str| {
                    v.trim()
                        .parse::<u8>()
                        .map_err(|e| invalid(format!("bad bound '{v}': {e}")))
                };
                let (lower, upper) = (parse(lower)?, parse(upper)?);
                if lower >= upper || upper > 100 {
                    return Err(invalid(format!("range {lower}:{upper} is not within 0..=100")));
                }
                Ok((lower, upper))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let [low, mid, high, almost]: [(u8, u8); 4] = pairs
            .try_into()
            .map_err(|p: Vec<_>| invalid(format!("expected 4 ranges, got {}", p.len())))?;

        Ok(Self {
            low: BandRange::open(low.0, low.1),
            mid: BandRange::open(mid.0, mid.1),
            high: BandRange::open(high.0, high.1),
            almost: BandRange::closed_above(almost.0, almost.1),
        })
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// A progress message due for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressNotice {
    pub job_id: JobId,
    pub band: ProgressBand,
    pub percent: u8,
    pub prompt_excerpt: Option<String>,
}

impl fmt::Display for ProgressNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&progress_text(
            &self.job_id,
            self.prompt_excerpt.as_deref(),
            self.percent,
        ))
    }
}

/// What the tracker made of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Keep polling; announce `notice` if present.
    Continue { notice: Option<ProgressNotice> },
    /// The job is finished. `outcome` is `Some` only the first time.
    Terminal { outcome: Option<JobOutcome> },
}

impl Observation {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}

// ---------------------------------------------------------------------------
// JobProgressTracker
// ---------------------------------------------------------------------------

/// In-memory progress state for one job.
#[derive(Debug)]
pub struct JobProgressTracker {
    job_id: JobId,
    policy: BandPolicy,
    bands_notified: BTreeSet<ProgressBand>,
    started_at: Instant,
    terminal_seen: bool,
}

impl JobProgressTracker {
    pub fn new(job_id: impl Into<JobId>, policy: BandPolicy) -> Self {
        Self {
            job_id: job_id.into(),
            policy,
            bands_notified: BTreeSet::new(),
            started_at: Instant::now(),
            terminal_seen: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn bands_notified(&self) -> &BTreeSet<ProgressBand> {
        &self.bands_notified
    }

    pub fn terminal_seen(&self) -> bool {
        self.terminal_seen
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Feed one snapshot into the state machine.
    pub fn observe(&mut self, record: &JobRecord) -> Observation {
        if self.terminal_seen {
            return Observation::Terminal { outcome: None };
        }

        if record.is_terminal() {
            self.terminal_seen = true;
            return Observation::Terminal {
                outcome: Some(self.terminal_outcome(record)),
            };
        }

        let notice = self
            .policy
            .classify(record.progress_percent)
            .filter(|band| self.bands_notified.insert(*band))
            .map(|band| ProgressNotice {
                job_id: self.job_id.clone(),
                band,
                percent: record.progress_percent,
                prompt_excerpt: record.prompt_excerpt.clone(),
            });

        Observation::Continue { notice }
    }

    fn terminal_outcome(&self, record: &JobRecord) -> JobOutcome {
        let job_id = self.job_id.clone();
        match record.status {
            JobStatus::Failure => JobOutcome::Failed {
                job_id,
                reason: record
                    .fail_reason
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
            },
            _ => {
                // A describe push with no text still has its source image.
                let result = match (record.action, record.result_text.clone()) {
                    (JobAction::Describe, Some(text)) => JobResult::Description {
                        text,
                        image_url: record.result_url.clone(),
                    },
                    _ => JobResult::Image {
                        url: record.result_url.clone(),
                    },
                };
                JobOutcome::Succeeded {
                    job_id: Some(job_id),
                    result,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mjrelay_core::job::JobPush;

    fn in_progress(percent: &str) -> JobRecord {
        JobRecord::from(&JobPush::new("42", "IN_PROGRESS").with_progress(percent))
    }

    fn tracker() -> JobProgressTracker {
        JobProgressTracker::new("42", BandPolicy::default())
    }

    fn notice_band(observation: Observation) -> Option<ProgressBand> {
        match observation {
            Observation::Continue { notice } => notice.map(|n| n.band),
            Observation::Terminal { .. } => panic!("unexpected terminal observation"),
        }
    }

    #[test]
    fn classification_follows_default_bands() {
        let policy = BandPolicy::default();
        assert_eq!(policy.classify(0), Some(ProgressBand::Init));
        assert_eq!(policy.classify(1), Some(ProgressBand::Low));
        assert_eq!(policy.classify(19), Some(ProgressBand::Low));
        assert_eq!(policy.classify(20), None);
        assert_eq!(policy.classify(40), None);
        assert_eq!(policy.classify(45), Some(ProgressBand::Mid));
        assert_eq!(policy.classify(55), None);
        assert_eq!(policy.classify(79), Some(ProgressBand::High));
        assert_eq!(policy.classify(85), None);
        assert_eq!(policy.classify(90), None);
        assert_eq!(policy.classify(100), Some(ProgressBand::Almost));
    }

    #[test]
    fn every_band_fires_at_most_once_for_monotone_progress() {
        let mut t = tracker();
        let mut fired = Vec::new();
        for p in 0..=100u8 {
            if let Some(band) = notice_band(t.observe(&in_progress(&format!("{p}%")))) {
                fired.push(band);
            }
        }
        assert_eq!(
            fired,
            vec![
                ProgressBand::Init,
                ProgressBand::Low,
                ProgressBand::Mid,
                ProgressBand::High,
                ProgressBand::Almost,
            ]
        );
    }

    #[test]
    fn repeated_snapshots_do_not_renotify() {
        let mut t = tracker();
        assert_eq!(notice_band(t.observe(&in_progress("15%"))), Some(ProgressBand::Low));
        assert_eq!(notice_band(t.observe(&in_progress("16%"))), None);
        assert_eq!(notice_band(t.observe(&in_progress("15%"))), None);
        assert!(t.bands_notified().contains(&ProgressBand::Low));
    }

    #[test]
    fn gap_values_stay_silent() {
        let mut t = tracker();
        for _ in 0..5 {
            assert_eq!(notice_band(t.observe(&in_progress("55%"))), None);
        }
        assert_eq!(notice_band(t.observe(&in_progress("61%"))), Some(ProgressBand::High));
    }

    #[test]
    fn first_call_success_is_terminal_without_notice() {
        let mut t = tracker();
        let push = JobPush::new("42", "SUCCESS")
            .with_progress("100%")
            .with_image_url("http://x/y.png");

        let observation = t.observe(&JobRecord::from(&push));
        assert_matches!(
            observation,
            Observation::Terminal {
                outcome: Some(JobOutcome::Succeeded {
                    result: JobResult::Image { url: Some(ref url) },
                    ..
                })
            } if url == "http://x/y.png"
        );
        assert!(t.bands_notified().is_empty());
        assert!(t.terminal_seen());

        assert_eq!(
            t.observe(&JobRecord::from(&push)),
            Observation::Terminal { outcome: None }
        );
    }

    #[test]
    fn describe_success_yields_text() {
        let mut t = tracker();
        let push = JobPush::new("42", "SUCCESS")
            .with_action("DESCRIBE")
            .with_prompt("1. a fox --ar 1:1")
            .with_image_url("http://x/src.png");

        assert_matches!(
            t.observe(&JobRecord::from(&push)),
            Observation::Terminal {
                outcome: Some(JobOutcome::Succeeded {
                    result: JobResult::Description { ref text, .. },
                    ..
                })
            } if text == "1. a fox --ar 1:1"
        );
    }

    #[test]
    fn failure_without_reason_gets_default() {
        let mut t = tracker();
        let record = JobRecord::from(&JobPush::new("42", "FAILURE"));
        assert_matches!(
            t.observe(&record),
            Observation::Terminal {
                outcome: Some(JobOutcome::Failed { ref reason, .. })
            } if reason == UNKNOWN_FAILURE
        );
    }

    #[test]
    fn notice_renders_with_prompt_excerpt() {
        let mut t = tracker();
        let push = JobPush::new("42", "IN_PROGRESS")
            .with_progress("15%")
            .with_prompt("a cat");
        let Observation::Continue { notice: Some(notice) } = t.observe(&JobRecord::from(&push)) else {
            panic!("expected a progress notice");
        };
        assert_eq!(notice.to_string(), "Task ID: 42 (a cat)... progress 15%");
    }

    #[test]
    fn band_policy_parses_custom_thresholds() {
        let policy: BandPolicy = "0:10, 30:50,60:70,95:100".parse().unwrap();
        assert_eq!(policy.classify(5), Some(ProgressBand::Low));
        assert_eq!(policy.classify(15), None);
        assert_eq!(policy.classify(100), Some(ProgressBand::Almost));
        assert_eq!(policy, "0:10,30:50,60:70,95:100".parse::<BandPolicy>().unwrap());
    }

    #[test]
    fn band_policy_rejects_bad_input() {
        assert_matches!("0:20,40:50".parse::<BandPolicy>(), Err(CoreError::Config { .. }));
        assert_matches!("0:20,50:40,60:80,90:100".parse::<BandPolicy>(), Err(CoreError::Config { .. }));
        assert_matches!("0:20,40:50,60:80,90:101".parse::<BandPolicy>(), Err(CoreError::Config { .. }));
        assert_matches!("a:b,40:50,60:80,90:100".parse::<BandPolicy>(), Err(CoreError::Config { .. }));
    }

    #[test]
    fn default_policy_round_trips_from_text() {
        assert_eq!(
            "0:20,40:50,60:80,90:100".parse::<BandPolicy>().unwrap(),
            BandPolicy::default()
        );
    }
}
