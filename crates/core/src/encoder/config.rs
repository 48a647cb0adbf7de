//! Configuration for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional ffmpeg output arguments, inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Minimum interval between progress updates, in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_progress_interval() -> u64 {
    500
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

impl EncoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the ffmpeg log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.ffmpeg_log_level = level.into();
        self
    }
}
