//! Trait definitions for the engine module.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::EngineError;
use super::types::{ConversionParams, ConversionProgress};

/// An initialized codec engine that turns one still image into one clip.
///
/// Implementations are not assumed to be safe for concurrent invocations;
/// [`super::EngineAdapter`] never calls `convert` twice at the same time.
#[async_trait]
pub trait CodecEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Encodes `input` into an MP4 according to `params`.
    ///
    /// Progress updates go to `progress_tx`; the sender is dropped when the
    /// call returns. If the receiver is gone, conversion continues without
    /// progress reporting.
    async fn convert(
        &self,
        input: Bytes,
        params: &ConversionParams,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<Bytes, EngineError>;
}

/// Creates the shared engine instance.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Returns the name of the engine this factory builds.
    fn name(&self) -> &str;

    /// Performs the (possibly expensive) engine initialization.
    async fn create(&self) -> Result<Arc<dyn CodecEngine>, EngineError>;
}
