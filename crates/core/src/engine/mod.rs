//! Codec engine module for turning still images into vertical video clips.
//!
//! The [`CodecEngine`] trait abstracts one encoder instance; [`EngineFactory`]
//! performs its (possibly slow) initialization. Callers never talk to an
//! engine directly: they go through [`EngineAdapter`], which initializes the
//! engine once on first use, admits one conversion at a time, normalizes
//! progress and collapses every failure into [`ConversionFailed`].
//!
//! # Example
//!
//! ```ignore
//! use stillreel_core::engine::{EngineAdapter, EngineConfig, FfmpegEngineFactory, ConversionParams};
//!
//! let config = EngineConfig::default();
//! let adapter = EngineAdapter::new(
//!     Arc::new(FfmpegEngineFactory::new(config.clone())),
//!     ConversionParams::from_config(&config, 5.0),
//! );
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let output = adapter.convert(image_bytes, &adapter.params(3.2), Some(tx)).await?;
//! println!("Encoded {} bytes in {} ms", output.bytes.len(), output.elapsed_ms);
//! ```

mod adapter;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use adapter::EngineAdapter;
pub use config::EngineConfig;
pub use error::{ConversionFailed, EngineError};
pub use ffmpeg::{FfmpegEngine, FfmpegEngineFactory};
pub use traits::{CodecEngine, EngineFactory};
pub use types::{
    ConversionOutput, ConversionParams, ConversionProgress, PixelFormat, ScalePolicy, VideoCodec,
    TARGET_HEIGHT, TARGET_WIDTH,
};
