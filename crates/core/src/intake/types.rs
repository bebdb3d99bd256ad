use bytes::Bytes;
use serde::Serialize;

use crate::registry::Job;

/// A file offered for intake.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    /// Declared media type, if the client sent one.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl IncomingFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<impl Into<String>>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(Into::into),
            bytes: bytes.into(),
        }
    }
}

/// A refused file and the user-visible reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub file_name: String,
    pub kind: &'static str,
    pub reason: String,
}

/// Outcome of one intake call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntakeReport {
    /// One pending job per accepted file, in submission order.
    pub accepted: Vec<Job>,
    pub rejected: Vec<Rejection>,
}

impl IntakeReport {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}
