//! Per-process conversion session.
//!
//! A [`Session`] owns all job state: the job registry, the binary store
//! holding every source and output, and the shared batch duration. It is
//! created once at startup and handed (behind an `Arc`) to intake, the batch
//! orchestrator and the result access layer.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, RwLock};

use crate::registry::JobRegistry;
use crate::store::BinaryStore;

pub struct Session {
    registry: JobRegistry,
    store: BinaryStore,
    duration_secs: RwLock<f64>,
    /// Held while removing jobs and while publishing a finished output, so a
    /// result is never stored for a job that is being released.
    lifecycle: Mutex<()>,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with the given batch duration.
    ///
    /// The duration is expected to be already normalized; see
    /// [`crate::orchestrator::normalize_duration`].
    pub fn new(duration_secs: f64) -> Self {
        Self {
            registry: JobRegistry::new(),
            store: BinaryStore::new(),
            duration_secs: RwLock::new(duration_secs),
            lifecycle: Mutex::new(()),
            started_at: Utc::now(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn store(&self) -> &BinaryStore {
        &self.store
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current batch duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        match self.duration_secs.read() {
            Ok(secs) => *secs,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_duration_secs(&self, secs: f64) {
        match self.duration_secs.write() {
            Ok(mut current) => *current = secs,
            Err(poisoned) => *poisoned.into_inner() = secs,
        }
    }

    /// The guarded value is `()`, so a poisoned lock carries no broken state.
    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("jobs", &self.registry.len())
            .field("store", &self.store.stats())
            .field("duration_secs", &self.duration_secs())
            .field("started_at", &self.started_at)
            .finish()
    }
}
