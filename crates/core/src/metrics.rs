//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Intake (accepted and rejected files)
//! - Engine (initializations, conversions)
//! - Batch runs
//! - Retained binary data

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Intake Metrics
// =============================================================================

/// Files offered for intake by outcome.
pub static INTAKE_FILES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillreel_intake_files_total", "Files offered for intake"),
        &["result"], // "accepted", "not_an_image", "too_large", "empty", "internal"
    )
    .unwrap()
});

// =============================================================================
// Engine Metrics
// =============================================================================

/// Engine initialization attempts by result.
pub static ENGINE_INITIALIZATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stillreel_engine_initializations_total",
            "Engine initialization attempts",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Conversions total by result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillreel_conversions_total", "Total image conversions"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stillreel_conversion_duration_seconds",
            "Duration of image conversions",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &[],
    )
    .unwrap()
});

/// Time spent waiting for the engine while another conversion runs.
pub static ENGINE_WAIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stillreel_engine_wait_seconds",
            "Time spent waiting for exclusive engine access",
        )
        .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch runs started.
pub static BATCH_RUNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("stillreel_batch_runs_total", "Total batch runs started").unwrap()
});

/// Batch jobs by outcome.
pub static BATCH_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillreel_batch_jobs_total", "Jobs processed by batch runs"),
        &["outcome"], // "completed", "failed", "skipped", "discarded"
    )
    .unwrap()
});

// =============================================================================
// Store Metrics
// =============================================================================

/// Bytes currently retained in the binary store.
pub static STORE_RETAINED_BYTES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "stillreel_store_retained_bytes",
        "Bytes currently retained in the binary store",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Intake
        Box::new(INTAKE_FILES.clone()),
        // Engine
        Box::new(ENGINE_INITIALIZATIONS.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(ENGINE_WAIT_DURATION.clone()),
        // Batch
        Box::new(BATCH_RUNS.clone()),
        Box::new(BATCH_JOBS.clone()),
        // Store
        Box::new(STORE_RETAINED_BYTES.clone()),
    ]
}
