//! Types for the batch orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::JobId;

/// Shortest clip a batch may produce, in seconds.
pub const MIN_DURATION_SECS: f64 = 1.0;
/// Longest clip a batch may produce, in seconds.
pub const MAX_DURATION_SECS: f64 = 10.0;
/// Granularity of the batch duration.
pub const DURATION_STEP_SECS: f64 = 0.1;

/// Errors that can occur during batch control.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// A run was requested while another is in progress.
    #[error("a batch run is already in progress")]
    AlreadyRunning,

    /// Batch parameters cannot change during a run.
    #[error("cannot change batch parameters while a run is in progress")]
    RunInProgress,

    /// Duration outside the accepted range.
    #[error("duration must be between {min} and {max} seconds, got {value}")]
    InvalidDuration { value: f64, min: f64, max: f64 },
}

/// Rounds a duration to one decimal and checks it is within range.
pub fn normalize_duration(secs: f64) -> Result<f64, BatchError> {
    let invalid = || BatchError::InvalidDuration {
        value: secs,
        min: MIN_DURATION_SECS,
        max: MAX_DURATION_SECS,
    };

    if !secs.is_finite() {
        return Err(invalid());
    }
    // Tenths, half away from zero
    let rounded = (secs * 10.0).round() / 10.0;
    if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&rounded) {
        return Err(invalid());
    }
    Ok(rounded)
}

/// How one job of a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Failed,
    /// Removed, or no longer eligible, before its turn.
    Skipped,
    /// Removed while converting; the output was thrown away.
    Discarded,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Discarded => "discarded",
        }
    }
}

/// Totals for one finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Jobs captured in the run's snapshot.
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub discarded: usize,
    pub elapsed_ms: u64,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Discarded => self.discarded += 1,
        }
    }
}

/// Aggregate progress of the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    /// Whether a run is in progress.
    pub running: bool,
    /// Jobs captured by the current (or last) run.
    pub total: usize,
    /// Jobs of that run that reached a terminal state or were skipped.
    pub finished: usize,
    /// Job being converted right now.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<JobId>,
    /// Duration applied to jobs started from now on.
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_duration_rounds_to_tenths() {
        assert_eq!(normalize_duration(3.2).unwrap(), 3.2);
        assert_eq!(normalize_duration(3.24).unwrap(), 3.2);
        assert_eq!(normalize_duration(3.25).unwrap(), 3.3);
        assert_eq!(normalize_duration(1.0).unwrap(), 1.0);
        assert_eq!(normalize_duration(10.0).unwrap(), 10.0);
        assert_eq!(normalize_duration(0.96).unwrap(), 1.0);
    }

    #[test]
    fn test_normalize_duration_rejects_out_of_range() {
        assert!(matches!(
            normalize_duration(0.5),
            Err(BatchError::InvalidDuration { .. })
        ));
        assert!(normalize_duration(10.2).is_err());
        assert!(normalize_duration(f64::NAN).is_err());
        assert!(normalize_duration(f64::INFINITY).is_err());
        assert!(normalize_duration(-3.0).is_err());
    }

    #[test]
    fn test_summary_record() {
        let mut summary = BatchSummary::default();
        summary.record(JobOutcome::Completed);
        summary.record(JobOutcome::Failed);
        summary.record(JobOutcome::Completed);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn test_status_serialization() {
        let status = BatchStatus {
            running: true,
            total: 3,
            finished: 1,
            current: None,
            duration_secs: 5.0,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["total"], 3);
        assert!(json.get("current").is_none());
    }
}
