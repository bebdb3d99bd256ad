//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::store::BlobHandle;

/// Stable identifier of a job. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Returns the status as a lowercase label (used for logs and metrics).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether a batch run may pick up a job in this status.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }

    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Error,
    ];
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image-to-video conversion unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Original file name, display only.
    pub source_name: String,
    /// Declared media type of the source image.
    pub source_content_type: String,
    /// Size of the source image in bytes.
    pub source_size: u64,
    pub preview_handle: BlobHandle,
    /// Set if and only if `status` is `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_handle: Option<BlobHandle>,
    pub status: JobStatus,
    /// Percentage 0-100.
    pub progress: u8,
    /// Set if and only if `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// How many times the job entered `Processing`.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested change of a job's status fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// `Pending`/`Error` -> `Processing`.
    Start,
    /// Progress report for a `Processing` job.
    Progress(u8),
    /// `Processing` -> `Completed` with the stored output.
    Complete { output: BlobHandle },
    /// `Processing` -> `Error` with a human-readable cause.
    Fail { detail: String },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress(_) => "progress",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
        }
    }
}

/// Change notification delivered synchronously to registry listeners.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Created { job: Job },
    Updated { job: Job },
    Removed { job_id: JobId },
    Cleared { removed: usize },
}

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Error => self.error,
        }
    }

    pub(crate) fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Error => self.error += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert!(JobStatus::Error.is_eligible());
        assert!(JobStatus::Pending.is_eligible());
        assert!(!JobStatus::Completed.is_eligible());
        assert!(!JobStatus::Processing.is_eligible());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = JobEvent::Removed {
            job_id: JobId::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "removed");
        assert!(json["job_id"].is_string());
    }
}
