//! In-memory binary store for source images and produced videos.
//!
//! The store exclusively owns the bytes of every job, keyed by
//! `(job id, kind)`. Everything handed out is either a [`BlobHandle`]
//! (a lookup key, no bytes) or a reference-counted clone of the buffer,
//! so an engine invocation that is still reading a source keeps it alive
//! after the store has released its own reference.

mod error;
mod memory;
mod types;

pub use error::StoreError;
pub use memory::BinaryStore;
pub use types::{BlobHandle, BlobKind, StoreStats, StoredBlob, OUTPUT_CONTENT_TYPE};
