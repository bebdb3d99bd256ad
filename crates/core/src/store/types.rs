//! Types for the binary store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::JobId;

/// Media type of every produced clip.
pub const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// What a stored buffer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobKind {
    /// The uploaded still image.
    Source,
    /// The produced MP4.
    Output,
}

impl BlobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to stored bytes.
///
/// A handle carries no data. It only resolves through [`super::BinaryStore`]
/// and stops resolving as soon as the store releases the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobHandle {
    job_id: JobId,
    kind: BlobKind,
}

impl BlobHandle {
    pub fn new(job_id: JobId, kind: BlobKind) -> Self {
        Self { job_id, kind }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn kind(&self) -> BlobKind {
        self.kind
    }
}

/// A stored buffer and its media type.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

impl StoredBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Snapshot of what the store currently retains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub source_entries: usize,
    pub output_entries: usize,
    pub retained_bytes: u64,
}
