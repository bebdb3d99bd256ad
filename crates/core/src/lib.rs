pub mod config;
pub mod engine;
pub mod intake;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod results;
pub mod session;
pub mod store;
pub mod testing;

pub use config::{
    config_path_from_env, load_config, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig, ServerConfig, SingleShotConfig,
};
pub use engine::{
    CodecEngine, ConversionFailed, ConversionOutput, ConversionParams, ConversionProgress,
    EngineAdapter, EngineConfig, EngineError, EngineFactory, FfmpegEngine, FfmpegEngineFactory,
};
pub use intake::{ImageIntake, IncomingFile, IntakeConfig, IntakeReport, Rejection, ValidationError};
pub use orchestrator::{
    BatchConfig, BatchError, BatchOrchestrator, BatchStatus, BatchSummary, JobOutcome,
};
pub use registry::{Job, JobEvent, JobId, JobRegistry, JobStatus, RegistryError, Transition};
pub use results::{
    suggested_file_name, ClearReport, DownloadEntry, Downloadable, Preview, ResultAccess,
    ResultError,
};
pub use session::Session;
pub use store::{BinaryStore, BlobHandle, BlobKind, StoreError, OUTPUT_CONTENT_TYPE};
