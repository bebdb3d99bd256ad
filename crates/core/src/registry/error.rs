//! Error types for the job registry.

use thiserror::Error;

use super::types::{JobId, JobStatus};

/// Errors returned by registry operations.
///
/// All of these are caller-side precondition violations: the registry state
/// is left untouched when one is returned.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// A job with this id already exists.
    #[error("Job already exists: {0}")]
    DuplicateId(JobId),

    /// The transition is not allowed from the job's current status.
    #[error("Cannot {transition} job {job_id}: current status is {from}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        transition: &'static str,
    },

    /// Another job is already processing.
    #[error("Cannot start job {job_id}: job {processing} is already processing")]
    EngineBusy { job_id: JobId, processing: JobId },

    /// A writer panicked while holding the registry lock.
    #[error("Job registry lock poisoned")]
    LockPoisoned,
}
