//! In-memory job registry.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use super::error::RegistryError;
use super::types::{Job, JobEvent, JobId, JobStatus, StatusCounts, Transition};
use crate::store::{BlobHandle, BlobKind};

/// Callback invoked synchronously for every registry mutation.
///
/// Listeners run in mutation order and may read the registry, but must not
/// mutate it.
pub type JobListener = Arc<dyn Fn(&JobEvent) + Send + Sync>;

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Request to register a new job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub source_name: String,
    pub source_content_type: String,
    pub source_size: u64,
    /// Handle to the already stored source bytes; its job id becomes the job's id.
    pub preview_handle: BlobHandle,
}

/// Ordered, lock-guarded set of jobs.
///
/// Every status change goes through [`JobRegistry::transition`], which
/// enforces the job state machine and the rule that at most one job is
/// processing at any instant.
pub struct JobRegistry {
    jobs: RwLock<Vec<Job>>,
    listeners: RwLock<Vec<(ListenerId, JobListener)>>,
    dispatch: Mutex<()>,
    next_listener: AtomicU64,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.len())
            .finish_non_exhaustive()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            dispatch: Mutex::new(()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Registers a listener. It receives every event from now on.
    pub fn subscribe(&self, listener: JobListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push((id, listener)),
            Err(_) => warn!("Listener list lock poisoned, listener not registered"),
        }
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.write() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Holds the dispatch lock so that events reach listeners in mutation order.
    fn begin(&self) -> Result<MutexGuard<'_, ()>, RegistryError> {
        self.dispatch.lock().map_err(|_| RegistryError::LockPoisoned)
    }

    fn notify(&self, event: &JobEvent) {
        let listeners: Vec<JobListener> = match self.listeners.read() {
            Ok(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(event);
        }
    }

    /// Inserts a new `Pending` job at the end of the creation order.
    pub fn create(&self, request: CreateJobRequest) -> Result<Job, RegistryError> {
        let _order = self.begin()?;
        let id = request.preview_handle.job_id();
        let now = Utc::now();
        let job = Job {
            id,
            source_name: request.source_name,
            source_content_type: request.source_content_type,
            source_size: request.source_size,
            preview_handle: request.preview_handle,
            output_handle: None,
            status: JobStatus::Pending,
            progress: 0,
            error_detail: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        };

        {
            let mut jobs = self.jobs.write().map_err(|_| RegistryError::LockPoisoned)?;
            if jobs.iter().any(|j| j.id == id) {
                return Err(RegistryError::DuplicateId(id));
            }
            jobs.push(job.clone());
        }

        debug!(job_id = %id, source = %job.source_name, "Job created");
        self.notify(&JobEvent::Created { job: job.clone() });
        Ok(job)
    }

    /// Applies a state-machine transition and returns the updated job.
    pub fn transition(&self, id: JobId, transition: Transition) -> Result<Job, RegistryError> {
        let _order = self.begin()?;

        let (job, changed) = {
            let mut jobs = self.jobs.write().map_err(|_| RegistryError::LockPoisoned)?;

            if transition == Transition::Start {
                if let Some(busy) = jobs
                    .iter()
                    .find(|j| j.status == JobStatus::Processing && j.id != id)
                {
                    return Err(RegistryError::EngineBusy {
                        job_id: id,
                        processing: busy.id,
                    });
                }
            }

            let job = jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or(RegistryError::NotFound(id))?;
            let changed = apply(job, &transition)?;
            if changed {
                job.updated_at = Utc::now();
            }
            (job.clone(), changed)
        };

        if changed {
            if !matches!(transition, Transition::Progress(_)) {
                debug!(job_id = %id, status = %job.status, "Job transitioned");
            }
            self.notify(&JobEvent::Updated { job: job.clone() });
        }
        Ok(job)
    }

    /// Removes a job and returns it.
    pub fn remove(&self, id: JobId) -> Result<Job, RegistryError> {
        let _order = self.begin()?;
        let job = {
            let mut jobs = self.jobs.write().map_err(|_| RegistryError::LockPoisoned)?;
            let idx = jobs
                .iter()
                .position(|j| j.id == id)
                .ok_or(RegistryError::NotFound(id))?;
            jobs.remove(idx)
        };
        debug!(job_id = %id, "Job removed");
        self.notify(&JobEvent::Removed { job_id: id });
        Ok(job)
    }

    /// Removes every job and returns them in creation order.
    pub fn clear(&self) -> Result<Vec<Job>, RegistryError> {
        let _order = self.begin()?;
        let removed = {
            let mut jobs = self.jobs.write().map_err(|_| RegistryError::LockPoisoned)?;
            std::mem::take(&mut *jobs)
        };
        debug!(removed = removed.len(), "Registry cleared");
        self.notify(&JobEvent::Cleared {
            removed: removed.len(),
        });
        Ok(removed)
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs
            .read()
            .ok()
            .and_then(|jobs| jobs.iter().find(|j| j.id == id).cloned())
    }

    /// Snapshot of all jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.jobs.read().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Ids of `Pending` and `Error` jobs in creation order.
    pub fn eligible(&self) -> Vec<JobId> {
        self.jobs
            .read()
            .map(|jobs| {
                jobs.iter()
                    .filter(|j| j.status.is_eligible())
                    .map(|j| j.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The job currently processing, if any.
    pub fn processing(&self) -> Option<JobId> {
        self.jobs.read().ok().and_then(|jobs| {
            jobs.iter()
                .find(|j| j.status == JobStatus::Processing)
                .map(|j| j.id)
        })
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        if let Ok(jobs) = self.jobs.read() {
            for job in jobs.iter() {
                counts.add(job.status);
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutates `job` according to `transition`. Returns whether anything changed.
fn apply(job: &mut Job, transition: &Transition) -> Result<bool, RegistryError> {
    let invalid = |job: &Job| RegistryError::InvalidTransition {
        job_id: job.id,
        from: job.status,
        transition: transition.name(),
    };

    match transition {
        Transition::Start => {
            if !job.status.is_eligible() {
                return Err(invalid(job));
            }
            job.status = JobStatus::Processing;
            job.progress = 0;
            job.error_detail = None;
            job.output_handle = None;
            job.attempts += 1;
            Ok(true)
        }
        Transition::Progress(percent) => {
            if job.status != JobStatus::Processing {
                return Err(invalid(job));
            }
            let percent = (*percent).min(100);
            if percent <= job.progress {
                return Ok(false);
            }
            job.progress = percent;
            Ok(true)
        }
        Transition::Complete { output } => {
            if job.status != JobStatus::Processing
                || output.job_id() != job.id
                || output.kind() != BlobKind::Output
            {
                return Err(invalid(job));
            }
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.output_handle = Some(*output);
            job.error_detail = None;
            Ok(true)
        }
        Transition::Fail { detail } => {
            if job.status != JobStatus::Processing {
                return Err(invalid(job));
            }
            let detail = detail.trim();
            job.status = JobStatus::Error;
            job.error_detail = Some(if detail.is_empty() {
                "conversion failed".to_string()
            } else {
                detail.to_string()
            });
            job.output_handle = None;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn request(name: &str) -> CreateJobRequest {
        CreateJobRequest {
            source_name: name.to_string(),
            source_content_type: "image/jpeg".to_string(),
            source_size: 1024,
            preview_handle: BlobHandle::new(JobId::new(), BlobKind::Source),
        }
    }

    fn output_for(id: JobId) -> BlobHandle {
        BlobHandle::new(id, BlobKind::Output)
    }

    #[test]
    fn test_create_is_pending_and_ordered() {
        let registry = JobRegistry::new();
        let a = registry.create(request("a.jpg")).unwrap();
        let b = registry.create(request("b.jpg")).unwrap();
        let c = registry.create(request("c.jpg")).unwrap();

        assert_eq!(a.status, JobStatus::Pending);
        assert_eq!(a.progress, 0);
        assert!(a.output_handle.is_none());

        let ids: Vec<JobId> = registry.list().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = JobRegistry::new();
        let req = request("a.jpg");
        registry.create(req.clone()).unwrap();
        assert!(matches!(
            registry.create(req),
            Err(RegistryError::DuplicateId(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_happy_path_transitions() {
        let registry = JobRegistry::new();
        let job = registry.create(request("a.jpg")).unwrap();

        let started = registry.transition(job.id, Transition::Start).unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert_eq!(started.attempts, 1);

        registry.transition(job.id, Transition::Progress(40)).unwrap();
        let done = registry
            .transition(
                job.id,
                Transition::Complete {
                    output: output_for(job.id),
                },
            )
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.output_handle, Some(output_for(job.id)));
    }

    #[test]
    fn test_progress_is_non_decreasing() {
        let registry = JobRegistry::new();
        let job = registry.create(request("a.jpg")).unwrap();
        registry.transition(job.id, Transition::Start).unwrap();

        registry.transition(job.id, Transition::Progress(60)).unwrap();
        let after = registry.transition(job.id, Transition::Progress(30)).unwrap();
        assert_eq!(after.progress, 60);

        let clamped = registry.transition(job.id, Transition::Progress(250)).unwrap();
        assert_eq!(clamped.progress, 100);
    }

    #[test]
    fn test_progress_requires_processing() {
        let registry = JobRegistry::new();
        let job = registry.create(request("a.jpg")).unwrap();
        let err = registry
            .transition(job.id, Transition::Progress(10))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidTransition {
                from: JobStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn test_completed_is_terminal() {
        let registry = JobRegistry::new();
        let job = registry.create(request("a.jpg")).unwrap();
        registry.transition(job.id, Transition::Start).unwrap();
        registry
            .transition(
                job.id,
                Transition::Complete {
                    output: output_for(job.id),
                },
            )
            .unwrap();

        assert!(registry.transition(job.id, Transition::Start).is_err());
        assert!(registry
            .transition(
                job.id,
                Transition::Fail {
                    detail: "late".to_string()
                }
            )
            .is_err());
    }

    #[test]
    fn test_error_can_restart_and_clears_detail() {
        let registry = JobRegistry::new();
        let job = registry.create(request("a.jpg")).unwrap();
        registry.transition(job.id, Transition::Start).unwrap();
        let failed = registry
            .transition(
                job.id,
                Transition::Fail {
                    detail: "  ".to_string(),
                },
            )
            .unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.error_detail.as_deref(), Some("conversion failed"));

        let restarted = registry.transition(job.id, Transition::Start).unwrap();
        assert_eq!(restarted.status, JobStatus::Processing);
        assert!(restarted.error_detail.is_none());
        assert_eq!(restarted.attempts, 2);
    }

    #[test]
    fn test_complete_rejects_foreign_handle() {
        let registry = JobRegistry::new();
        let job = registry.create(request("a.jpg")).unwrap();
        registry.transition(job.id, Transition::Start).unwrap();

        let foreign = output_for(JobId::new());
        assert!(registry
            .transition(job.id, Transition::Complete { output: foreign })
            .is_err());
        let source = BlobHandle::new(job.id, BlobKind::Source);
        assert!(registry
            .transition(job.id, Transition::Complete { output: source })
            .is_err());
        assert_eq!(registry.get(job.id).unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_only_one_job_processing() {
        let registry = JobRegistry::new();
        let a = registry.create(request("a.jpg")).unwrap();
        let b = registry.create(request("b.jpg")).unwrap();

        registry.transition(a.id, Transition::Start).unwrap();
        let err = registry.transition(b.id, Transition::Start).unwrap_err();
        assert!(matches!(err, RegistryError::EngineBusy { processing, .. } if processing == a.id));
        assert_eq!(registry.counts().processing, 1);
        assert_eq!(registry.processing(), Some(a.id));
    }

    #[test]
    fn test_eligible_snapshot() {
        let registry = JobRegistry::new();
        let a = registry.create(request("a.jpg")).unwrap();
        let b = registry.create(request("b.jpg")).unwrap();
        let c = registry.create(request("c.jpg")).unwrap();

        registry.transition(a.id, Transition::Start).unwrap();
        registry
            .transition(
                a.id,
                Transition::Complete {
                    output: output_for(a.id),
                },
            )
            .unwrap();
        registry.transition(b.id, Transition::Start).unwrap();
        registry
            .transition(
                b.id,
                Transition::Fail {
                    detail: "boom".to_string(),
                },
            )
            .unwrap();

        assert_eq!(registry.eligible(), vec![b.id, c.id]);
        let counts = registry.counts();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = JobRegistry::new();
        let a = registry.create(request("a.jpg")).unwrap();
        registry.create(request("b.jpg")).unwrap();

        assert_eq!(registry.remove(a.id).unwrap().id, a.id);
        assert!(matches!(
            registry.remove(a.id),
            Err(RegistryError::NotFound(_))
        ));
        assert!(registry.get(a.id).is_none());

        let removed = registry.clear().unwrap();
        assert_eq!(removed.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_listeners_observe_every_mutation_in_order() {
        let registry = JobRegistry::new();
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener_id = registry.subscribe(Arc::new(move |event: &JobEvent| {
            let label = match event {
                JobEvent::Created { .. } => "created".to_string(),
                JobEvent::Updated { job } => format!("updated:{}:{}", job.status, job.progress),
                JobEvent::Removed { .. } => "removed".to_string(),
                JobEvent::Cleared { removed } => format!("cleared:{}", removed),
            };
            sink.lock().unwrap().push(label);
        }));

        let job = registry.create(request("a.jpg")).unwrap();
        registry.transition(job.id, Transition::Start).unwrap();
        registry.transition(job.id, Transition::Progress(50)).unwrap();
        // No-op progress does not emit.
        registry.transition(job.id, Transition::Progress(50)).unwrap();
        registry.remove(job.id).unwrap();
        registry.clear().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "created",
                "updated:processing:0",
                "updated:processing:50",
                "removed",
                "cleared:0",
            ]
        );

        assert!(registry.unsubscribe(listener_id));
        assert!(!registry.unsubscribe(listener_id));
        registry.create(request("b.jpg")).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_listener_may_read_registry() {
        let registry = Arc::new(JobRegistry::new());
        let observed = Arc::new(StdMutex::new(0usize));
        let reg = Arc::clone(&registry);
        let sink = Arc::clone(&observed);
        registry.subscribe(Arc::new(move |_event: &JobEvent| {
            *sink.lock().unwrap() = reg.len();
        }));

        registry.create(request("a.jpg")).unwrap();
        registry.create(request("b.jpg")).unwrap();
        assert_eq!(*observed.lock().unwrap(), 2);
    }
}
