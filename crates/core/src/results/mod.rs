//! Result access layer: serves finished clips and source previews, and
//! releases every resource of a job when it is discarded.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::{JobId, JobStatus, RegistryError};
use crate::session::Session;
use crate::store::StoreError;

/// Name used when a source name has no usable stem.
const FALLBACK_STEM: &str = "video";

#[derive(Debug, Error)]
pub enum ResultError {
    /// No job with this id exists.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The job exists but has no finished clip.
    #[error("Job {job_id} is not ready for download (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    #[error("Registry error: {0}")]
    Registry(RegistryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<RegistryError> for ResultError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(id),
            other => Self::Registry(other),
        }
    }
}

/// A finished clip ready to hand to the user.
#[derive(Debug, Clone)]
pub struct Downloadable {
    pub job_id: JobId,
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
}

/// The source image of a job.
#[derive(Debug, Clone)]
pub struct Preview {
    pub job_id: JobId,
    pub bytes: Bytes,
    pub content_type: String,
}

/// Listing entry for a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadEntry {
    pub job_id: JobId,
    pub file_name: String,
    pub size: u64,
}

/// A release that did not go through during a bulk clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseFailure {
    /// `None` when the failure was not tied to one job.
    pub job_id: Option<JobId>,
    pub reason: String,
}

/// Outcome of [`ResultAccess::clear_all_and_release`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub removed: Vec<JobId>,
    pub released_bytes: u64,
    pub failures: Vec<ReleaseFailure>,
}

/// Download name for a clip made from `source_name`.
///
/// Drops the last extension and appends `.mp4`: `beach.photo.jpg` becomes
/// `beach.photo.mp4`, `scan` becomes `scan.mp4`, `.jpg` becomes `video.mp4`.
pub fn suggested_file_name(source_name: &str) -> String {
    // Only the final path component is meaningful
    let name = source_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(source_name)
        .trim();

    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };

    if stem.trim().is_empty() {
        format!("{}.mp4", FALLBACK_STEM)
    } else {
        format!("{}.mp4", stem)
    }
}

/// Read and release access to a session's results.
#[derive(Debug, Clone)]
pub struct ResultAccess {
    session: Arc<Session>,
}

impl ResultAccess {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// The finished clip of a completed job.
    pub fn get_downloadable(&self, id: JobId) -> Result<Downloadable, ResultError> {
        let job = self
            .session
            .registry()
            .get(id)
            .ok_or(ResultError::NotFound(id))?;

        let handle = match (job.status, job.output_handle) {
            (JobStatus::Completed, Some(handle)) => handle,
            (status, _) => return Err(ResultError::NotReady { job_id: id, status }),
        };

        let blob = self.session.store().resolve(&handle).map_err(|e| match e {
            StoreError::NotFound { .. } => ResultError::NotFound(id),
            other => ResultError::Store(other),
        })?;

        Ok(Downloadable {
            job_id: id,
            bytes: blob.bytes,
            file_name: suggested_file_name(&job.source_name),
            content_type: blob.content_type,
        })
    }

    /// The source image of a job, in any status.
    pub fn get_preview(&self, id: JobId) -> Result<Preview, ResultError> {
        let job = self
            .session
            .registry()
            .get(id)
            .ok_or(ResultError::NotFound(id))?;

        let blob = self
            .session
            .store()
            .resolve(&job.preview_handle)
            .map_err(|e| match e {
                StoreError::NotFound { .. } => ResultError::NotFound(id),
                other => ResultError::Store(other),
            })?;

        Ok(Preview {
            job_id: id,
            bytes: blob.bytes,
            content_type: blob.content_type,
        })
    }

    /// Every completed job in creation order.
    pub fn downloadables(&self) -> Vec<DownloadEntry> {
        let store = self.session.store();
        self.session
            .registry()
            .list()
            .into_iter()
            .filter(|job| job.status == JobStatus::Completed)
            .filter_map(|job| {
                let handle = job.output_handle?;
                let blob = store.resolve(&handle).ok()?;
                Some(DownloadEntry {
                    job_id: job.id,
                    file_name: suggested_file_name(&job.source_name),
                    size: blob.len() as u64,
                })
            })
            .collect()
    }

    /// Removes a job and releases everything stored for it.
    ///
    /// Returns the number of bytes released. A conversion still running for
    /// the job finishes on its own copy of the input and its output is
    /// discarded.
    pub fn remove_and_release(&self, id: JobId) -> Result<u64, ResultError> {
        let _lifecycle = self.session.lifecycle();

        let job = self.session.registry().remove(id)?;
        let released = self.session.store().remove_all(id)?;

        info!(
            job_id = %id,
            source = %job.source_name,
            status = %job.status,
            released,
            "Job removed"
        );
        Ok(released)
    }

    /// Removes every job and releases every stored byte.
    ///
    /// Keeps going past individual failures and reports them.
    pub fn clear_all_and_release(&self) -> ClearReport {
        let _lifecycle = self.session.lifecycle();
        let store = self.session.store();
        let mut report = ClearReport::default();

        match self.session.registry().clear() {
            Ok(jobs) => {
                for job in jobs {
                    match store.remove_all(job.id) {
                        Ok(released) => {
                            report.released_bytes += released;
                            report.removed.push(job.id);
                        }
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "Failed to release job");
                            report.failures.push(ReleaseFailure {
                                job_id: Some(job.id),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear job registry");
                report.failures.push(ReleaseFailure {
                    job_id: None,
                    reason: e.to_string(),
                });
            }
        }

        // Sweep anything left behind by failed releases or a failed clear
        let leftover = store.stats();
        match store.clear() {
            Ok(0) => {}
            Ok(entries) => {
                report.released_bytes += leftover.retained_bytes;
                warn!(entries, "Released orphaned store entries");
            }
            Err(e) => report.failures.push(ReleaseFailure {
                job_id: None,
                reason: e.to_string(),
            }),
        }

        info!(
            removed = report.removed.len(),
            released_bytes = report.released_bytes,
            failures = report.failures.len(),
            "Cleared all jobs"
        );
        report
    }
}
