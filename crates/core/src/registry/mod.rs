//! Job registry: the ordered set of known jobs and their state machine.

mod error;
mod memory;
mod types;

pub use error::RegistryError;
pub use memory::{CreateJobRequest, JobListener, JobRegistry, ListenerId};
pub use types::{Job, JobEvent, JobId, JobStatus, StatusCounts, Transition};
