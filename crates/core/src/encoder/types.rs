//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video codec used for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP9
    Vp9,
    /// AV1
    Av1,
}

impl VideoCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
        }
    }

    /// Whether the encoder understands x264-style `-preset` names.
    pub fn supports_preset(&self) -> bool {
        matches!(self, Self::H264 | Self::H265)
    }
}

/// Audio codec used for the re-encoded audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Advanced Audio Coding
    Aac,
    /// Opus
    Opus,
    /// MPEG Audio Layer III
    Mp3,
}

impl AudioCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Opus => "libopus",
            Self::Mp3 => "libmp3lame",
        }
    }
}

/// Encoder effort. Slower presets trade encode time for smaller output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    /// Returns the name ffmpeg expects after `-preset`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ultrafast" => Ok(Self::Ultrafast),
            "superfast" => Ok(Self::Superfast),
            "veryfast" => Ok(Self::Veryfast),
            "faster" => Ok(Self::Faster),
            "fast" => Ok(Self::Fast),
            "medium" => Ok(Self::Medium),
            "slow" => Ok(Self::Slow),
            "slower" => Ok(Self::Slower),
            "veryslow" => Ok(Self::Veryslow),
            other => Err(format!("unknown preset: {}", other)),
        }
    }
}

/// The encoding parameters applied uniformly to every job in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeProfile {
    /// Target video codec.
    #[serde(default = "default_video_codec")]
    pub video_codec: VideoCodec,
    /// Constant Rate Factor (lower = better quality, 0-51 for x264/x265).
    #[serde(default = "default_crf")]
    pub crf: u8,
    /// Encoder preset.
    #[serde(default = "default_preset")]
    pub preset: Preset,
    /// Relocate the moov atom to the start of the file for progressive playback.
    #[serde(default = "default_faststart")]
    pub faststart: bool,
    /// Maximum output width. Height follows the aspect ratio and is kept even.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Audio codec for the re-encoded audio track.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: AudioCodec,
    /// Audio bitrate in kbps.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
}

fn default_video_codec() -> VideoCodec {
    VideoCodec::H264
}

fn default_crf() -> u8 {
    28 // good enough for web
}

fn default_preset() -> Preset {
    Preset::Slower
}

fn default_faststart() -> bool {
    true
}

fn default_max_width() -> u32 {
    1280
}

fn default_audio_codec() -> AudioCodec {
    AudioCodec::Aac
}

fn default_audio_bitrate() -> u32 {
    128
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            crf: default_crf(),
            preset: default_preset(),
            faststart: default_faststart(),
            max_width: default_max_width(),
            audio_codec: default_audio_codec(),
            audio_bitrate_kbps: default_audio_bitrate(),
        }
    }
}

/// One input file found by the directory scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File name, used to derive the output path.
    pub file_name: String,
    /// Size in bytes at scan time.
    pub size_bytes: u64,
}

/// The work unit for one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Position in discovery order, starting at 0.
    pub index: usize,
    /// The input file.
    pub input: MediaFile,
    /// Where the encoded file is written.
    pub output_path: PathBuf,
    /// Encoding parameters.
    pub profile: TranscodeProfile,
}

impl TranscodeJob {
    /// Builds the job for `input`, writing to `output_dir/<file name>`.
    pub fn new(
        index: usize,
        input: MediaFile,
        output_dir: &std::path::Path,
        profile: TranscodeProfile,
    ) -> Self {
        let output_path = output_dir.join(&input.file_name);
        Self {
            index,
            input,
            output_path,
            profile,
        }
    }
}

/// Progress update emitted by an encoder while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeProgress {
    /// Percent complete (0-100).
    pub percent: f32,
    /// Position reached in the input, in seconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_secs: Option<f64>,
    /// Total input duration in seconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Encoding speed reported by the encoder (e.g. "1.5x").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
}
