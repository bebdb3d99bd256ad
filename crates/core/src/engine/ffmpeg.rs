//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use bytes::Bytes;
use regex_lite::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::{CodecEngine, EngineFactory};
use super::types::{ConversionParams, ConversionProgress};

const OUTPUT_FILE_NAME: &str = "output.mp4";

/// FFmpeg-based engine. Each conversion runs in its own staging directory
/// that is removed when the call returns.
pub struct FfmpegEngine {
    config: EngineConfig,
    version: Option<String>,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    ///
    /// Prefer [`FfmpegEngineFactory`], which checks the binary first.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            version: None,
        }
    }

    /// Version line reported by the binary during initialization.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Builds ffmpeg arguments for a still-image to clip conversion.
    fn build_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        params: &ConversionParams,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            // Repeat the single frame for the whole duration
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{:.3}", params.duration_secs),
            "-vf".to_string(),
            params.video_filter(),
            "-r".to_string(),
            params.fps.to_string(),
        ];

        args.extend([
            "-c:v".to_string(),
            params.codec.ffmpeg_codec().to_string(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            params.crf.to_string(),
            "-pix_fmt".to_string(),
            params.pixel_format.ffmpeg_name().to_string(),
        ]);

        if params.fast_start {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        // No audio track
        args.push("-an".to_string());

        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        args.push(output_path.to_string_lossy().to_string());

        args
    }

    /// File extension for the staged input, derived from the image signature.
    fn input_extension(input: &[u8]) -> Result<&'static str, EngineError> {
        let format = image::guess_format(input)
            .map_err(|_| EngineError::invalid_input("unrecognized image data"))?;
        Ok(format.extensions_str().first().copied().unwrap_or("img"))
    }

    /// Runs ffmpeg with progress reporting.
    async fn run_conversion(
        &self,
        input: Bytes,
        params: &ConversionParams,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<Bytes, EngineError> {
        if input.is_empty() {
            return Err(EngineError::invalid_input("input is empty"));
        }
        params.validate()?;
        let extension = Self::input_extension(&input)?;

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let staging = tempfile::Builder::new()
            .prefix("convert-")
            .tempdir_in(&self.config.temp_dir)?;

        let input_path = staging.path().join(format!("input.{}", extension));
        let output_path = staging.path().join(OUTPUT_FILE_NAME);
        tokio::fs::write(&input_path, &input).await?;

        let args = self.build_args(&input_path, &output_path, params);
        debug!(?args, "spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::encoding_failed("ffmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let mut current_time = 0.0;
        let mut current_speed = None;
        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=\s*(\d+\.?\d*)x").ok();
        let duration_secs = params.duration_secs;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut last_progress_send: Option<Instant> = None;
            let progress_interval = Duration::from_millis(self.config.progress_interval_ms);
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") || line.contains("Invalid") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let Some(ref re) = time_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(us_str) = caps.get(1) {
                            if let Ok(us) = us_str.as_str().parse::<f64>() {
                                current_time = us / 1_000_000.0; // Microseconds despite the name
                            }
                        }
                    }
                }

                if let Some(ref re) = speed_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(speed_str) = caps.get(1) {
                            current_speed = Some(format!("{}x", speed_str.as_str()));
                        }
                    }
                }

                let due = last_progress_send
                    .map(|at| at.elapsed() >= progress_interval)
                    .unwrap_or(true);
                if due && line.starts_with("progress=") {
                    let percent = (current_time / duration_secs * 100.0).clamp(0.0, 100.0) as f32;
                    let progress = ConversionProgress {
                        percent,
                        time_secs: current_time,
                        speed: current_speed.clone(),
                    };

                    // Non-blocking send
                    let _ = progress_tx.try_send(progress);
                    last_progress_send = Some(Instant::now());
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(EngineError::encoding_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
            }
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                return Err(EngineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output = tokio::fs::read(&output_path)
            .await
            .map_err(|_| EngineError::encoding_failed("Output file not created", None))?;
        if output.is_empty() {
            return Err(EngineError::encoding_failed("Output file is empty", None));
        }

        // `staging` is dropped here and takes both files with it
        Ok(Bytes::from(output))
    }
}

#[async_trait]
impl CodecEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn convert(
        &self,
        input: Bytes,
        params: &ConversionParams,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<Bytes, EngineError> {
        self.run_conversion(input, params, progress_tx).await
    }
}

/// Builds an [`FfmpegEngine`] after checking the binary runs and the
/// staging directory is writable.
pub struct FfmpegEngineFactory {
    config: EngineConfig,
}

impl FfmpegEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for FfmpegEngineFactory {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn create(&self) -> Result<Arc<dyn CodecEngine>, EngineError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::init_failed(format!(
                "{} -version exited with code: {:?}",
                self.config.ffmpeg_path.display(),
                output.status.code()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string());

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;

        info!(
            path = %self.config.ffmpeg_path.display(),
            version = version.as_deref().unwrap_or("unknown"),
            "FFmpeg engine ready"
        );

        Ok(Arc::new(FfmpegEngine {
            config: self.config.clone(),
            version,
        }))
    }
}
