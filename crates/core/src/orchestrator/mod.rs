//! Batch orchestrator - converts every eligible job of a session.
//!
//! A run captures the ids of all `pending` and `error` jobs when it starts
//! and converts them strictly one after another through the shared
//! [`crate::engine::EngineAdapter`]. While a run is in progress a second run
//! and any change of the batch duration are refused.

mod config;
mod runner;
mod types;

pub use config::BatchConfig;
pub use runner::{BatchOrchestrator, StatusCallback};
pub use types::{
    normalize_duration, BatchError, BatchStatus, BatchSummary, JobOutcome, DURATION_STEP_SECS,
    MAX_DURATION_SECS, MIN_DURATION_SECS,
};
