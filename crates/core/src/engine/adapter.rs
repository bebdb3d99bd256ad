//! Shared, lazily initialized access to the codec engine.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, OnceCell, Semaphore};
use tracing::{debug, info, warn};

use super::error::ConversionFailed;
use super::traits::{CodecEngine, EngineFactory};
use super::types::{ConversionOutput, ConversionParams, ConversionProgress};
use crate::metrics;

/// Capacity of the channel between the engine and the adapter's relay.
const ENGINE_PROGRESS_BUFFER: usize = 64;

/// Wraps an [`EngineFactory`] and serializes every conversion through one
/// engine instance.
///
/// - The engine is created on first use. Concurrent first callers share a
///   single initialization; a failed initialization is retried by the next
///   caller.
/// - At most one conversion runs at a time across all callers.
/// - Progress forwarded to callers is clamped to 0..=100, never decreases,
///   and ends with 100 on success.
pub struct EngineAdapter {
    factory: Arc<dyn EngineFactory>,
    engine: OnceCell<Arc<dyn CodecEngine>>,
    exclusive: Semaphore,
    base_params: ConversionParams,
}

impl EngineAdapter {
    /// Creates an adapter. `base_params` supplies every setting except the
    /// duration, which each caller picks via [`EngineAdapter::params`].
    pub fn new(factory: Arc<dyn EngineFactory>, base_params: ConversionParams) -> Self {
        Self {
            factory,
            engine: OnceCell::new(),
            exclusive: Semaphore::new(1),
            base_params,
        }
    }

    /// Name of the engine behind this adapter.
    pub fn engine_name(&self) -> &str {
        self.factory.name()
    }

    /// Whether the engine has been initialized.
    pub fn is_ready(&self) -> bool {
        self.engine.initialized()
    }

    /// Whether a conversion currently holds the engine.
    pub fn is_busy(&self) -> bool {
        self.exclusive.available_permits() == 0
    }

    /// Conversion parameters for a clip of the given length.
    pub fn params(&self, duration_secs: f64) -> ConversionParams {
        self.base_params.with_duration(duration_secs)
    }

    /// Initializes the engine if needed and returns it.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn CodecEngine>, ConversionFailed> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!(engine = self.factory.name(), "Initializing codec engine");
                let start = Instant::now();
                match self.factory.create().await {
                    Ok(engine) => {
                        metrics::ENGINE_INITIALIZATIONS
                            .with_label_values(&["success"])
                            .inc();
                        info!(
                            engine = engine.name(),
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Codec engine initialized"
                        );
                        Ok(engine)
                    }
                    Err(e) => {
                        metrics::ENGINE_INITIALIZATIONS
                            .with_label_values(&["failed"])
                            .inc();
                        warn!(error = %e, "Codec engine initialization failed");
                        Err(ConversionFailed::from(e))
                    }
                }
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    /// Converts one image into one clip.
    ///
    /// Waits for exclusive access to the engine first. When `progress_tx`
    /// is given, it receives normalized progress updates; a receiver that
    /// went away does not affect the conversion.
    pub async fn convert(
        &self,
        input: Bytes,
        params: &ConversionParams,
        progress_tx: Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<ConversionOutput, ConversionFailed> {
        params.validate().map_err(ConversionFailed::from)?;
        let engine = self.ensure_ready().await?;

        let wait_start = Instant::now();
        let _permit = self
            .exclusive
            .acquire()
            .await
            .map_err(|_| ConversionFailed::new("engine is shut down"))?;
        metrics::ENGINE_WAIT_DURATION
            .with_label_values(&[])
            .observe(wait_start.elapsed().as_secs_f64());

        let start = Instant::now();
        debug!(
            engine = engine.name(),
            input_size = input.len(),
            duration_secs = params.duration_secs,
            "Starting conversion"
        );

        let (engine_tx, mut engine_rx) =
            mpsc::channel::<ConversionProgress>(ENGINE_PROGRESS_BUFFER);
        let relay = async {
            let mut last = 0.0f32;
            while let Some(progress) = engine_rx.recv().await {
                let percent = if progress.percent.is_finite() {
                    progress.percent.clamp(0.0, 100.0)
                } else {
                    continue;
                };
                if percent <= last {
                    continue;
                }
                last = percent;
                if let Some(tx) = &progress_tx {
                    let _ = tx.try_send(ConversionProgress {
                        percent,
                        ..progress
                    });
                }
            }
        };

        let (result, ()) = tokio::join!(engine.convert(input, params, engine_tx), relay);
        let elapsed = start.elapsed();

        let result = match result {
            Ok(bytes) if bytes.is_empty() => {
                Err(ConversionFailed::new("engine produced no output"))
            }
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(ConversionFailed::from(e)),
        };

        match result {
            Ok(bytes) => {
                if let Some(tx) = &progress_tx {
                    let _ = tx.send(ConversionProgress::percent(100.0)).await;
                }
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&["success"])
                    .inc();
                metrics::CONVERSION_DURATION
                    .with_label_values(&[])
                    .observe(elapsed.as_secs_f64());
                info!(
                    output_size = bytes.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Conversion completed"
                );
                Ok(ConversionOutput {
                    bytes,
                    elapsed_ms: elapsed.as_millis() as u64,
                })
            }
            Err(e) => {
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
                warn!(cause = %e.cause, "Conversion failed");
                Err(e)
            }
        }
    }
}
