//! Mock codec engine for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::engine::{
    CodecEngine, ConversionParams, ConversionProgress, EngineError, EngineFactory,
};

/// Bytes returned by a successful mock conversion: an MP4 `ftyp` box header.
pub const MOCK_OUTPUT: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";

/// A recorded conversion for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// Size of the input that was submitted.
    pub input_len: usize,
    /// Parameters the conversion ran with.
    pub params: ConversionParams,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of both [`EngineFactory`] and [`CodecEngine`].
///
/// Clones share state, so a test keeps one handle for assertions and hands
/// another to the adapter:
/// - Count initializations and simulate slow or failing ones
/// - Record conversions
/// - Fail the next conversion with a chosen error
/// - Emit scripted progress values
/// - Track the highest number of overlapping conversions
///
/// # Example
///
/// ```rust,ignore
/// use stillreel_core::testing::MockEngine;
///
/// let engine = MockEngine::new();
/// let adapter = EngineAdapter::new(Arc::new(engine.clone()), ConversionParams::vertical(5.0));
///
/// engine.set_next_error(EngineError::invalid_input("corrupt")).await;
/// assert!(adapter.convert(bytes, &adapter.params(2.0), None).await.is_err());
/// assert_eq!(engine.init_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// Recorded conversions.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// If set, the next conversion will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// If set, the next initialization will fail with this error.
    init_error: Arc<RwLock<Option<EngineError>>>,
    /// Progress values emitted during each conversion.
    progress_steps: Arc<RwLock<Vec<f32>>>,
    /// Bytes returned by successful conversions.
    output: Arc<RwLock<Bytes>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<AtomicU64>,
    /// Simulated initialization duration in milliseconds.
    init_delay_ms: Arc<AtomicU64>,
    init_count: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            init_error: Arc::new(RwLock::new(None)),
            progress_steps: Arc::new(RwLock::new(vec![25.0, 50.0, 75.0])),
            output: Arc::new(RwLock::new(Bytes::from_static(MOCK_OUTPUT))),
            conversion_duration_ms: Arc::new(AtomicU64::new(0)),
            init_delay_ms: Arc::new(AtomicU64::new(0)),
            init_count: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Get the number of conversions attempted.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Number of times the factory was asked to create the engine.
    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    /// Highest number of conversions observed running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Configure the next conversion to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Configure the next initialization to fail with the given error.
    pub async fn set_init_error(&self, error: EngineError) {
        *self.init_error.write().await = Some(error);
    }

    /// Set the progress values emitted by each conversion.
    pub async fn set_progress_steps(&self, steps: Vec<f32>) {
        *self.progress_steps.write().await = steps;
    }

    /// Set the bytes returned by successful conversions.
    pub async fn set_output(&self, output: Bytes) {
        *self.output.write().await = output;
    }

    /// Set the simulated conversion duration.
    pub fn set_conversion_duration_ms(&self, ms: u64) {
        self.conversion_duration_ms.store(ms, Ordering::SeqCst);
    }

    /// Set the simulated initialization duration.
    pub fn set_init_delay_ms(&self, ms: u64) {
        self.init_delay_ms.store(ms, Ordering::SeqCst);
    }

    async fn record(&self, input_len: usize, params: &ConversionParams, success: bool) {
        self.conversions.write().await.push(RecordedConversion {
            input_len,
            params: params.clone(),
            success,
        });
    }
}

#[async_trait]
impl EngineFactory for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(&self) -> Result<Arc<dyn CodecEngine>, EngineError> {
        self.init_count.fetch_add(1, Ordering::SeqCst);

        let delay = self.init_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(err) = self.init_error.write().await.take() {
            return Err(err);
        }

        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl CodecEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(
        &self,
        input: Bytes,
        params: &ConversionParams,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<Bytes, EngineError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let steps = self.progress_steps.read().await.clone();
        let total_ms = self.conversion_duration_ms.load(Ordering::SeqCst);
        let step_delay = Duration::from_millis(total_ms / (steps.len() as u64 + 1));

        for percent in steps {
            if !step_delay.is_zero() {
                tokio::time::sleep(step_delay).await;
            }
            let _ = progress_tx
                .send(ConversionProgress {
                    percent,
                    time_secs: params.duration_secs * f64::from(percent) / 100.0,
                    speed: Some("1.0x".to_string()),
                })
                .await;
        }
        if !step_delay.is_zero() {
            tokio::time::sleep(step_delay).await;
        }

        let result = match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(self.output.read().await.clone()),
        };

        self.record(input.len(), params, result.is_ok()).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
