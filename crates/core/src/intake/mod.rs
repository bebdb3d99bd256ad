//! Image intake: validates incoming files and turns each accepted one into
//! a pending job.
//!
//! A file is accepted when it is non-empty, within the size ceiling and
//! image-typed. A declared `image/*` media type is trusted; when the client
//! declared nothing usable (`None` or `application/octet-stream`) the
//! payload's signature decides. Every file is judged on its own, so one bad
//! file never blocks the rest.

mod config;
mod error;
mod types;

pub use config::{IntakeConfig, DEFAULT_MAX_FILE_BYTES};
pub use error::{format_size, ValidationError};
pub use types::{IncomingFile, IntakeReport, Rejection};

use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics;
use crate::registry::{CreateJobRequest, Job, JobId};
use crate::session::Session;
use crate::store::BlobKind;

const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// Accepts images into a session.
#[derive(Debug, Clone)]
pub struct ImageIntake {
    session: Arc<Session>,
    config: IntakeConfig,
}

impl ImageIntake {
    pub fn new(session: Arc<Session>, config: IntakeConfig) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Checks one file and returns the media type to record for it.
    pub fn validate(&self, file: &IncomingFile) -> Result<String, ValidationError> {
        validate_file(file, self.config.max_file_bytes)
    }

    /// Validates and registers every file independently.
    pub fn accept(&self, files: Vec<IncomingFile>) -> IntakeReport {
        let mut report = IntakeReport::default();

        for file in files {
            match self.accept_one(file) {
                Ok(job) => {
                    metrics::INTAKE_FILES.with_label_values(&["accepted"]).inc();
                    report.accepted.push(job);
                }
                Err(e) => {
                    metrics::INTAKE_FILES.with_label_values(&[e.kind()]).inc();
                    warn!(file = e.file_name(), reason = %e, "Rejected file at intake");
                    report.rejected.push(Rejection {
                        file_name: e.file_name().to_string(),
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.is_empty() {
            info!(
                accepted = report.accepted.len(),
                rejected = report.rejected.len(),
                "Intake finished"
            );
        }
        report
    }

    fn accept_one(&self, file: IncomingFile) -> Result<Job, ValidationError> {
        let content_type = self.validate(&file)?;
        let IncomingFile {
            file_name, bytes, ..
        } = file;

        let internal = |reason: String| ValidationError::Internal {
            file_name: file_name.clone(),
            reason,
        };

        let id = JobId::new();
        let source_size = bytes.len() as u64;

        // A clear must see either both the bytes and the job or neither
        let _lifecycle = self.session.lifecycle();
        let handle = self
            .session
            .store()
            .put(id, BlobKind::Source, bytes, content_type.clone())
            .map_err(|e| internal(e.to_string()))?;

        let created = self.session.registry().create(CreateJobRequest {
            source_name: file_name.clone(),
            source_content_type: content_type,
            source_size,
            preview_handle: handle,
        });

        match created {
            Ok(job) => Ok(job),
            Err(e) => {
                // Do not leave bytes behind for a job that does not exist
                let _ = self.session.store().remove_all(id);
                Err(internal(e.to_string()))
            }
        }
    }
}

/// Validates a file against a size ceiling and returns its media type.
pub fn validate_file(file: &IncomingFile, max_file_bytes: u64) -> Result<String, ValidationError> {
    if file.bytes.is_empty() {
        return Err(ValidationError::Empty {
            file_name: file.file_name.clone(),
        });
    }

    let size = file.bytes.len() as u64;
    if size > max_file_bytes {
        return Err(ValidationError::TooLarge {
            file_name: file.file_name.clone(),
            size,
            limit: max_file_bytes,
        });
    }

    let declared = file
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    match declared.as_deref() {
        Some(ct) if ct.starts_with("image/") => Ok(ct.to_string()),
        None | Some(GENERIC_CONTENT_TYPE) => image::guess_format(&file.bytes)
            .map(|format| format.to_mime_type().to_string())
            .map_err(|_| ValidationError::NotAnImage {
                file_name: file.file_name.clone(),
                content_type: declared.clone(),
            }),
        Some(_) => Err(ValidationError::NotAnImage {
            file_name: file.file_name.clone(),
            content_type: declared.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobStatus;
    use crate::results::ResultAccess;
    use crate::testing::fixtures;
    use bytes::Bytes;
    use std::thread;
    use std::time::Duration;

    fn intake() -> ImageIntake {
        ImageIntake::new(Arc::new(Session::new(5.0)), IntakeConfig::default())
    }

    #[test]
    fn test_accepts_declared_image() {
        let intake = intake();
        let report = intake.accept(vec![IncomingFile::new(
            "beach.jpg",
            Some("image/jpeg"),
            fixtures::jpeg_bytes(2 * 1024 * 1024),
        )]);

        assert_eq!(report.accepted.len(), 1);
        assert!(report.rejected.is_empty());

        let job = &report.accepted[0];
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.source_name, "beach.jpg");
        assert_eq!(job.source_content_type, "image/jpeg");
        assert_eq!(job.source_size, 2 * 1024 * 1024);
        assert!(intake
            .session
            .store()
            .contains(job.id, BlobKind::Source));
    }

    #[test]
    fn test_rejects_oversized_file_without_creating_job() {
        let intake = intake();
        let report = intake.accept(vec![IncomingFile::new(
            "huge.jpg",
            Some("image/jpeg"),
            fixtures::jpeg_bytes(15 * 1024 * 1024),
        )]);

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, "too_large");
        assert!(report.rejected[0].reason.contains("huge.jpg"));
        assert!(report.rejected[0].reason.contains("10 MiB"));
        assert!(intake.session.registry().is_empty());
        assert_eq!(intake.session.store().stats().entries, 0);
    }

    #[test]
    fn test_file_at_ceiling_is_accepted() {
        let intake = intake();
        let report = intake.accept(vec![IncomingFile::new(
            "exact.jpg",
            Some("image/jpeg"),
            fixtures::jpeg_bytes(DEFAULT_MAX_FILE_BYTES as usize),
        )]);
        assert_eq!(report.accepted.len(), 1);
    }

    #[test]
    fn test_sniffs_when_content_type_missing() {
        let file = IncomingFile::new("photo", None::<String>, fixtures::png_bytes());
        assert_eq!(validate_file(&file, 1024 * 1024).unwrap(), "image/png");

        let file = IncomingFile::new(
            "photo.bin",
            Some("application/octet-stream"),
            fixtures::png_bytes(),
        );
        assert_eq!(validate_file(&file, 1024 * 1024).unwrap(), "image/png");
    }

    #[test]
    fn test_rejects_non_images() {
        let declared = IncomingFile::new("notes.txt", Some("text/plain"), &b"hello"[..]);
        assert!(matches!(
            validate_file(&declared, 1024),
            Err(ValidationError::NotAnImage { .. })
        ));

        let undeclared = IncomingFile::new("blob", None::<String>, &b"plain bytes"[..]);
        assert!(matches!(
            validate_file(&undeclared, 1024),
            Err(ValidationError::NotAnImage { .. })
        ));

        let empty = IncomingFile::new("empty.png", Some("image/png"), Bytes::new());
        assert!(matches!(
            validate_file(&empty, 1024),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_content_type_parameters_are_ignored() {
        let file = IncomingFile::new("a.png", Some("Image/PNG; charset=binary"), fixtures::png_bytes());
        assert_eq!(validate_file(&file, 1024 * 1024).unwrap(), "image/png");
    }

    #[test]
    fn test_mixed_batch_each_file_judged_alone() {
        let intake = intake();
        let report = intake.accept(vec![
            IncomingFile::new("a.jpg", Some("image/jpeg"), fixtures::jpeg_bytes(1024)),
            IncomingFile::new("b.txt", Some("text/plain"), &b"nope"[..]),
            IncomingFile::new("c.png", None::<String>, fixtures::png_bytes()),
        ]);

        let names: Vec<_> = report.accepted.iter().map(|j| j.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "c.png"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].file_name, "b.txt");

        let ids: Vec<_> = report.accepted.iter().map(|j| j.id).collect();
        assert_ne!(ids[0], ids[1]);
        assert_eq!(intake.session.registry().len(), 2);
    }

    #[test]
    fn test_intake_waits_while_session_is_being_cleared() {
        let intake = Arc::new(intake());
        let lifecycle = intake.session.lifecycle();

        let adder = {
            let intake = Arc::clone(&intake);
            thread::spawn(move || {
                intake.accept(vec![IncomingFile::new(
                    "late.jpg",
                    Some("image/jpeg"),
                    fixtures::jpeg_bytes(2048),
                )])
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(intake.session.store().stats().entries, 0);
        assert!(intake.session.registry().is_empty());
        drop(lifecycle);

        let report = adder.join().unwrap();
        let job = &report.accepted[0];
        assert!(intake.session.store().contains(job.id, BlobKind::Source));
    }

    #[test]
    fn test_concurrent_clear_never_orphans_a_job() {
        let intake = Arc::new(intake());
        let results = Arc::new(ResultAccess::new(Arc::clone(&intake.session)));

        let adders: Vec<_> = (0..4)
            .map(|n| {
                let intake = Arc::clone(&intake);
                thread::spawn(move || {
                    for i in 0..100 {
                        intake.accept(vec![IncomingFile::new(
                            format!("{}-{}.jpg", n, i),
                            Some("image/jpeg"),
                            fixtures::jpeg_bytes(256),
                        )]);
                    }
                })
            })
            .collect();
        let clearer = {
            let results = Arc::clone(&results);
            thread::spawn(move || {
                for _ in 0..100 {
                    results.clear_all_and_release();
                    thread::yield_now();
                }
            })
        };

        for adder in adders {
            adder.join().unwrap();
        }
        clearer.join().unwrap();

        let store = intake.session.store();
        for job in intake.session.registry().list() {
            assert!(
                store.contains(job.id, BlobKind::Source),
                "job {} lost its source",
                job.source_name
            );
        }
        assert_eq!(store.stats().source_entries, intake.session.registry().len());
    }
}
