//! Types for the engine module.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::config::EngineConfig;
use super::error::EngineError;

/// Output frame width of every clip.
pub const TARGET_WIDTH: u32 = 1080;
/// Output frame height of every clip.
pub const TARGET_HEIGHT: u32 = 1920;

/// Video codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
}

impl VideoCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
        }
    }
}

/// Pixel format of the encoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 4:2:0 planar, the format every player decodes.
    Yuv420p,
}

impl PixelFormat {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
        }
    }
}

/// How the source image is fitted into the target frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Scale to fit inside the frame keeping aspect ratio, then center-pad to fill it.
    FitAndPad,
}

/// Parameters of one image-to-clip conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Clip length in seconds.
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub scale: ScalePolicy,
    pub pixel_format: PixelFormat,
    pub codec: VideoCodec,
    /// Constant rate factor.
    pub crf: u8,
    pub fps: u32,
    /// Move the index to the front of the container for progressive playback.
    pub fast_start: bool,
}

impl ConversionParams {
    /// Vertical 9:16 clip with the fixed encoding settings.
    pub fn vertical(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
            scale: ScalePolicy::FitAndPad,
            pixel_format: PixelFormat::Yuv420p,
            codec: VideoCodec::H264,
            crf: 23,
            fps: 30,
            fast_start: true,
        }
    }

    /// Vertical clip using the quality settings from the engine config.
    pub fn from_config(config: &EngineConfig, duration_secs: f64) -> Self {
        Self {
            crf: config.crf,
            fps: config.fps,
            ..Self::vertical(duration_secs)
        }
    }

    /// Same parameters with a different duration.
    pub fn with_duration(&self, duration_secs: f64) -> Self {
        Self {
            duration_secs,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(EngineError::invalid_params(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration_secs
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::invalid_params(format!(
                "invalid target size {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(EngineError::invalid_params(format!(
                "target size {}x{} must be even for {}",
                self.width,
                self.height,
                self.pixel_format.ffmpeg_name()
            )));
        }
        if self.crf > 51 {
            return Err(EngineError::invalid_params(format!(
                "crf must be within 0-51, got {}",
                self.crf
            )));
        }
        if self.fps == 0 {
            return Err(EngineError::invalid_params("fps cannot be 0"));
        }
        Ok(())
    }

    /// FFmpeg filter chain implementing the scale policy.
    pub fn video_filter(&self) -> String {
        match self.scale {
            ScalePolicy::FitAndPad => format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
                w = self.width,
                h = self.height
            ),
        }
    }
}

/// Progress update during conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Percentage complete (0.0 - 100.0).
    pub percent: f32,
    /// Encoded output time in seconds.
    pub time_secs: f64,
    /// Encoding speed as reported by the engine (e.g. "2.5x").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
}

impl ConversionProgress {
    pub fn percent(percent: f32) -> Self {
        Self {
            percent,
            time_secs: 0.0,
            speed: None,
        }
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The encoded MP4.
    pub bytes: Bytes,
    /// Wall-clock time of the conversion in milliseconds.
    pub elapsed_ms: u64,
}
