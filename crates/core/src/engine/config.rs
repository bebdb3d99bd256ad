//! Configuration for the codec engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Directory under which per-invocation staging directories are created.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// x264 preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor (0-51, lower is better quality).
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Minimum interval between progress notifications in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,

    /// Additional ffmpeg arguments inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("stillreel-engine")
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u8 {
    23
}

fn default_fps() -> u32 {
    30
}

fn default_progress_interval() -> u64 {
    250
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            temp_dir: default_temp_dir(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            preset: default_preset(),
            crf: default_crf(),
            fps: default_fps(),
            progress_interval_ms: default_progress_interval(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a new config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the staging directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
