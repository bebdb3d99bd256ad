//! Error types for image intake.

use thiserror::Error;

/// Why a single file was refused at intake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{file_name} is empty")]
    Empty { file_name: String },

    #[error("{file_name} is {} which exceeds the {} limit", format_size(*.size), format_size(*.limit))]
    TooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("{file_name} is not an image ({})", .content_type.as_deref().unwrap_or("unrecognized content"))]
    NotAnImage {
        file_name: String,
        content_type: Option<String>,
    },

    /// The file was valid but could not be stored or registered.
    #[error("{file_name} could not be added: {reason}")]
    Internal { file_name: String, reason: String },
}

impl ValidationError {
    /// Short machine-readable reason, used for metrics and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty { .. } => "empty",
            Self::TooLarge { .. } => "too_large",
            Self::NotAnImage { .. } => "not_an_image",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            Self::Empty { file_name }
            | Self::TooLarge { file_name, .. }
            | Self::NotAnImage { file_name, .. }
            | Self::Internal { file_name, .. } => file_name,
        }
    }
}

/// Formats a byte count the way users expect to read upload limits.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes >= MIB {
        let mib = bytes as f64 / MIB as f64;
        if bytes % MIB == 0 {
            format!("{} MiB", bytes / MIB)
        } else {
            format!("{:.1} MiB", mib)
        }
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
