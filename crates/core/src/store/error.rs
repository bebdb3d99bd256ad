//! Error types for the binary store.

use thiserror::Error;

use super::types::BlobKind;
use crate::registry::JobId;

/// Errors that can occur while reading or releasing stored bytes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No bytes are stored for this job and kind.
    #[error("No {kind} bytes stored for job {job_id}")]
    NotFound { job_id: JobId, kind: BlobKind },

    /// A writer panicked while holding the store lock.
    #[error("Binary store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn not_found(job_id: JobId, kind: BlobKind) -> Self {
        Self::NotFound { job_id, kind }
    }
}
