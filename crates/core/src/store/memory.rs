//! In-memory store implementation.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::error::StoreError;
use super::types::{BlobHandle, BlobKind, StoreStats, StoredBlob};
use crate::registry::JobId;

/// Owns the bytes of every job for the lifetime of the session.
#[derive(Debug, Default)]
pub struct BinaryStore {
    entries: RwLock<HashMap<(JobId, BlobKind), StoredBlob>>,
}

impl BinaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<(JobId, BlobKind), StoredBlob>>, StoreError> {
        self.entries.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<(JobId, BlobKind), StoredBlob>>, StoreError> {
        self.entries.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Associates bytes with a job and kind, replacing any previous entry.
    pub fn put(
        &self,
        job_id: JobId,
        kind: BlobKind,
        bytes: Bytes,
        content_type: impl Into<String>,
    ) -> Result<BlobHandle, StoreError> {
        let blob = StoredBlob {
            bytes,
            content_type: content_type.into(),
        };
        debug!(job_id = %job_id, kind = %kind, size = blob.len(), "Storing blob");
        self.write()?.insert((job_id, kind), blob);
        Ok(BlobHandle::new(job_id, kind))
    }

    /// Returns a cheap clone of the stored bytes.
    pub fn get(&self, job_id: JobId, kind: BlobKind) -> Result<StoredBlob, StoreError> {
        self.read()?
            .get(&(job_id, kind))
            .cloned()
            .ok_or_else(|| StoreError::not_found(job_id, kind))
    }

    /// Resolves a handle to its bytes.
    pub fn resolve(&self, handle: &BlobHandle) -> Result<StoredBlob, StoreError> {
        self.get(handle.job_id(), handle.kind())
    }

    pub fn contains(&self, job_id: JobId, kind: BlobKind) -> bool {
        self.read()
            .map(|entries| entries.contains_key(&(job_id, kind)))
            .unwrap_or(false)
    }

    /// Releases one kind for a job.
    ///
    /// Fails with `NotFound` when nothing was stored, which callers treat as
    /// a normal outcome.
    pub fn remove(&self, job_id: JobId, kind: BlobKind) -> Result<u64, StoreError> {
        let removed = self
            .write()?
            .remove(&(job_id, kind))
            .ok_or_else(|| StoreError::not_found(job_id, kind))?;
        debug!(job_id = %job_id, kind = %kind, size = removed.len(), "Released blob");
        Ok(removed.len() as u64)
    }

    /// Releases every kind stored for a job. Returns the number of bytes released.
    pub fn remove_all(&self, job_id: JobId) -> Result<u64, StoreError> {
        let mut entries = self.write()?;
        let mut released = 0u64;
        for kind in [BlobKind::Source, BlobKind::Output] {
            if let Some(blob) = entries.remove(&(job_id, kind)) {
                released += blob.len() as u64;
            }
        }
        if released > 0 {
            debug!(job_id = %job_id, released, "Released all blobs for job");
        }
        Ok(released)
    }

    /// Drops every entry. Returns the number of entries released.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut entries = self.write()?;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    pub fn stats(&self) -> StoreStats {
        let Ok(entries) = self.read() else {
            return StoreStats::default();
        };
        let mut stats = StoreStats::default();
        for ((_, kind), blob) in entries.iter() {
            stats.entries += 1;
            stats.retained_bytes += blob.len() as u64;
            match kind {
                BlobKind::Source => stats.source_entries += 1,
                BlobKind::Output => stats.output_entries += 1,
            }
        }
        stats
    }
}
