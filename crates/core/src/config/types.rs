use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::engine::EngineConfig;
use crate::intake::IntakeConfig;
use crate::orchestrator::BatchConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub single_shot: SingleShotConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Remote single-shot conversion endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SingleShotConfig {
    /// Clip duration used when the request does not carry one.
    #[serde(default = "default_single_shot_duration")]
    pub duration_secs: f64,
    /// Whether a `duration` multipart field may override `duration_secs`.
    #[serde(default = "default_allow_override")]
    pub allow_duration_override: bool,
}

impl Default for SingleShotConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_single_shot_duration(),
            allow_duration_override: default_allow_override(),
        }
    }
}

fn default_single_shot_duration() -> f64 {
    5.0
}

fn default_allow_override() -> bool {
    true
}

/// Sanitized config for API responses (host paths hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub intake: SanitizedIntakeConfig,
    pub batch: SanitizedBatchConfig,
    pub engine: SanitizedEngineConfig,
    pub single_shot: SingleShotConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIntakeConfig {
    pub max_file_bytes: u64,
}

/// Duration bounds are fixed; exposed so a settings surface can render the control.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBatchConfig {
    pub default_duration_secs: f64,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub duration_step_secs: f64,
    pub bulk_download_interval_ms: u64,
}

/// Engine settings without the binary and staging paths.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub ffmpeg_configured: bool,
    pub timeout_secs: u64,
    pub preset: String,
    pub crf: u8,
    pub fps: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            intake: SanitizedIntakeConfig {
                max_file_bytes: config.intake.max_file_bytes,
            },
            batch: SanitizedBatchConfig {
                default_duration_secs: config.batch.default_duration_secs,
                min_duration_secs: crate::orchestrator::MIN_DURATION_SECS,
                max_duration_secs: crate::orchestrator::MAX_DURATION_SECS,
                duration_step_secs: crate::orchestrator::DURATION_STEP_SECS,
                bulk_download_interval_ms: config.batch.bulk_download_interval_ms,
            },
            engine: SanitizedEngineConfig {
                ffmpeg_configured: !config.engine.ffmpeg_path.as_os_str().is_empty(),
                timeout_secs: config.engine.timeout_secs,
                preset: config.engine.preset.clone(),
                crf: config.engine.crf,
                fps: config.engine.fps,
            },
            single_shot: config.single_shot.clone(),
        }
    }
}
