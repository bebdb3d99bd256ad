//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Errors an engine implementation can report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Engine could not be initialized.
    #[error("Engine initialization failed: {reason}")]
    InitFailed { reason: String },

    /// Input bytes are not a decodable image.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Conversion parameters are out of range.
    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },

    /// Encoding process failed.
    #[error("Encoding failed: {reason}")]
    EncodingFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while staging or reading files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new initialization failure.
    pub fn init_failed(reason: impl Into<String>) -> Self {
        Self::InitFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid parameters error.
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Creates a new encoding failure with optional stderr output.
    pub fn encoding_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodingFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Human-readable cause, including the last line of engine output when there is one.
    pub fn cause(&self) -> String {
        match self {
            Self::EncodingFailed {
                stderr: Some(stderr),
                ..
            } => match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                Some(last) => format!("{}: {}", self, last.trim()),
                None => self.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

/// The single failure the engine adapter surfaces to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Conversion failed: {cause}")]
pub struct ConversionFailed {
    pub cause: String,
}

impl ConversionFailed {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

impl From<EngineError> for ConversionFailed {
    fn from(err: EngineError) -> Self {
        Self::new(err.cause())
    }
}

impl From<StoreError> for ConversionFailed {
    fn from(err: StoreError) -> Self {
        Self::new(err.to_string())
    }
}
