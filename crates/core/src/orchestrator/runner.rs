//! Batch orchestrator implementation.
//!
//! Drives eligible jobs through the codec engine strictly one after another:
//! - The set of jobs is captured when the run starts
//! - Each job reads the batch duration at the moment it starts
//! - Failures are recorded on the job and never stop the run

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{ConversionFailed, ConversionOutput, ConversionProgress, EngineAdapter};
use crate::metrics;
use crate::registry::{JobId, RegistryError, Transition};
use crate::session::Session;
use crate::store::{BlobKind, OUTPUT_CONTENT_TYPE};

use super::types::{normalize_duration, BatchError, BatchStatus, BatchSummary, JobOutcome};

/// Capacity of the per-job progress channel.
const PROGRESS_BUFFER: usize = 32;

/// Callback invoked whenever the aggregate batch status changes.
pub type StatusCallback = Arc<dyn Fn(&BatchStatus) + Send + Sync>;

#[derive(Default)]
struct RunState {
    running: AtomicBool,
    total: AtomicUsize,
    finished: AtomicUsize,
    current: Mutex<Option<JobId>>,
    /// Serializes claiming a run with changes to run parameters.
    control: Mutex<()>,
}

impl RunState {
    fn set_current(&self, id: Option<JobId>) {
        match self.current.lock() {
            Ok(mut current) => *current = id,
            Err(poisoned) => *poisoned.into_inner() = id,
        }
    }

    fn control(&self) -> MutexGuard<'_, ()> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current(&self) -> Option<JobId> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Proof that the caller owns the running flag. Clears it when dropped,
/// including when the run's task panics or is aborted.
struct RunGuard {
    state: Arc<RunState>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.set_current(None);
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// The batch orchestrator - converts every eligible job of a session.
pub struct BatchOrchestrator {
    session: Arc<Session>,
    engine: Arc<EngineAdapter>,
    state: Arc<RunState>,
    on_status: Option<StatusCallback>,
}

impl BatchOrchestrator {
    /// Create a new orchestrator.
    pub fn new(session: Arc<Session>, engine: Arc<EngineAdapter>) -> Self {
        Self {
            session,
            engine,
            state: Arc::new(RunState::default()),
            on_status: None,
        }
    }

    /// Set a callback for batch status changes.
    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.on_status = Some(callback);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn engine(&self) -> &Arc<EngineAdapter> {
        &self.engine
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Current aggregate status.
    pub fn status(&self) -> BatchStatus {
        BatchStatus {
            running: self.is_running(),
            total: self.state.total.load(Ordering::SeqCst),
            finished: self.state.finished.load(Ordering::SeqCst),
            current: self.state.current(),
            duration_secs: self.session.duration_secs(),
        }
    }

    /// Sets the batch duration. Rejected while a run is in progress.
    ///
    /// Returns the stored value, rounded to one decimal.
    pub fn set_duration(&self, secs: f64) -> Result<f64, BatchError> {
        let secs = {
            let _control = self.state.control();
            if self.is_running() {
                return Err(BatchError::RunInProgress);
            }
            let secs = normalize_duration(secs)?;
            self.session.set_duration_secs(secs);
            secs
        };
        info!(duration_secs = secs, "Batch duration updated");
        self.emit_status();
        Ok(secs)
    }

    /// Converts every job that is eligible now, one at a time, and waits
    /// for the run to finish.
    pub async fn run_all(&self) -> Result<BatchSummary, BatchError> {
        let (guard, snapshot) = self.try_begin()?;
        Ok(self.run_claimed(guard, snapshot).await)
    }

    /// Starts [`BatchOrchestrator::run_all`] on a background task.
    ///
    /// `AlreadyRunning` is reported before anything is spawned.
    pub fn spawn_run_all(self: &Arc<Self>) -> Result<JoinHandle<BatchSummary>, BatchError> {
        let (guard, snapshot) = self.try_begin()?;
        let orchestrator = Arc::clone(self);
        Ok(tokio::spawn(async move {
            orchestrator.run_claimed(guard, snapshot).await
        }))
    }

    /// Claims the running flag and captures the jobs of the run.
    fn try_begin(&self) -> Result<(RunGuard, Vec<JobId>), BatchError> {
        let _control = self.state.control();
        if self.state.running.swap(true, Ordering::SeqCst) {
            debug!("Batch run requested while one is in progress");
            return Err(BatchError::AlreadyRunning);
        }
        let guard = RunGuard {
            state: Arc::clone(&self.state),
        };

        let snapshot = self.session.registry().eligible();
        self.state.total.store(snapshot.len(), Ordering::SeqCst);
        self.state.finished.store(0, Ordering::SeqCst);
        Ok((guard, snapshot))
    }

    async fn run_claimed(&self, guard: RunGuard, snapshot: Vec<JobId>) -> BatchSummary {
        let start = Instant::now();
        metrics::BATCH_RUNS.inc();
        info!(
            jobs = snapshot.len(),
            duration_secs = self.session.duration_secs(),
            "Starting batch run"
        );
        self.emit_status();

        let mut summary = BatchSummary {
            attempted: snapshot.len(),
            ..Default::default()
        };

        for id in snapshot {
            let outcome = self.run_one(id).await;
            summary.record(outcome);
            metrics::BATCH_JOBS
                .with_label_values(&[outcome.as_str()])
                .inc();

            self.state.set_current(None);
            self.state.finished.fetch_add(1, Ordering::SeqCst);
            self.emit_status();
        }

        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            attempted = summary.attempted,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            discarded = summary.discarded,
            elapsed_ms = summary.elapsed_ms,
            "Batch run finished"
        );

        drop(guard);
        self.emit_status();
        summary
    }

    /// Converts one job of the snapshot.
    async fn run_one(&self, id: JobId) -> JobOutcome {
        let registry = self.session.registry();

        match registry.get(id) {
            Some(job) if job.status.is_eligible() => {}
            Some(job) => {
                debug!(job_id = %id, status = %job.status, "Job no longer eligible, skipping");
                return JobOutcome::Skipped;
            }
            None => {
                debug!(job_id = %id, "Job removed before its turn, skipping");
                return JobOutcome::Skipped;
            }
        }

        // Read once per job, at the moment it starts
        let duration_secs = self.session.duration_secs();

        let job = match registry.transition(id, Transition::Start) {
            Ok(job) => job,
            Err(RegistryError::NotFound(_)) => return JobOutcome::Skipped,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Could not start job");
                return JobOutcome::Skipped;
            }
        };
        self.state.set_current(Some(id));
        self.emit_status();
        info!(
            job_id = %id,
            source = %job.source_name,
            attempt = job.attempts,
            duration_secs,
            "Converting job"
        );

        let input = match self.session.store().get(id, BlobKind::Source) {
            Ok(blob) => blob.bytes,
            Err(e) => return self.fail(id, ConversionFailed::from(e)),
        };

        let params = self.engine.params(duration_secs);
        let (tx, mut rx) = mpsc::channel::<ConversionProgress>(PROGRESS_BUFFER);
        let relay = async {
            while let Some(progress) = rx.recv().await {
                // 100 is reserved for the completed transition
                let percent = (progress.percent.floor() as u8).min(99);
                match registry.transition(id, Transition::Progress(percent)) {
                    Ok(_) | Err(RegistryError::NotFound(_)) => {}
                    Err(e) => debug!(job_id = %id, error = %e, "Dropped progress update"),
                }
            }
        };

        let (result, ()) = tokio::join!(self.engine.convert(input, &params, Some(tx)), relay);

        match result {
            Ok(output) => self.publish(id, output),
            Err(e) => self.fail(id, e),
        }
    }

    /// Stores the output and completes the job, unless the job was removed
    /// while converting.
    fn publish(&self, id: JobId, output: ConversionOutput) -> JobOutcome {
        let _lifecycle = self.session.lifecycle();
        let registry = self.session.registry();
        let store = self.session.store();

        if registry.get(id).is_none() {
            info!(job_id = %id, "Job removed during conversion, discarding output");
            return JobOutcome::Discarded;
        }

        let size = output.bytes.len();
        let handle = match store.put(id, BlobKind::Output, output.bytes, OUTPUT_CONTENT_TYPE) {
            Ok(handle) => handle,
            Err(e) => return self.fail_locked(id, ConversionFailed::from(e)),
        };

        match registry.transition(id, Transition::Complete { output: handle }) {
            Ok(_) => {
                info!(
                    job_id = %id,
                    output_size = size,
                    elapsed_ms = output.elapsed_ms,
                    "Job completed"
                );
                JobOutcome::Completed
            }
            Err(e) => {
                warn!(job_id = %id, error = %e, "Could not complete job, releasing output");
                let _ = store.remove(id, BlobKind::Output);
                JobOutcome::Failed
            }
        }
    }

    fn fail(&self, id: JobId, failure: ConversionFailed) -> JobOutcome {
        let _lifecycle = self.session.lifecycle();
        self.fail_locked(id, failure)
    }

    fn fail_locked(&self, id: JobId, failure: ConversionFailed) -> JobOutcome {
        warn!(job_id = %id, cause = %failure.cause, "Job failed");
        match self
            .session
            .registry()
            .transition(id, Transition::Fail {
                detail: failure.cause,
            }) {
            Ok(_) => JobOutcome::Failed,
            Err(RegistryError::NotFound(_)) => JobOutcome::Discarded,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Could not record job failure");
                JobOutcome::Failed
            }
        }
    }

    fn emit_status(&self) {
        if let Some(callback) = &self.on_status {
            callback(&self.status());
        }
    }
}
