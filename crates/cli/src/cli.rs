use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use mediapress_core::{Config, Preset, VideoCodec};

#[derive(Parser)]
#[command(name = "mediapress")]
#[command(author, version, about = "Batch video compression for static web assets")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-encode every video in the source directory for the web
    Compress(CompressArgs),

    /// Copy every video in the source directory unchanged
    Copy(RunArgs),

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Print the effective configuration as TOML
    ShowConfig,
}

/// Options shared by every batch command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory to scan for videos
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Directory to write processed videos into
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of files processed at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Per-file timeout in seconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CompressArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Constant Rate Factor (lower = better quality)
    #[arg(long)]
    pub crf: Option<u8>,

    /// Encoder preset (ultrafast .. veryslow)
    #[arg(long)]
    pub preset: Option<Preset>,

    /// Maximum output width in pixels
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Video codec
    #[arg(long, value_enum)]
    pub video_codec: Option<CodecArg>,

    /// Audio bitrate in kbps
    #[arg(long)]
    pub audio_bitrate: Option<u32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecArg {
    H264,
    H265,
    Vp9,
    Av1,
}

impl From<CodecArg> for VideoCodec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::H264 => VideoCodec::H264,
            CodecArg::H265 => VideoCodec::H265,
            CodecArg::Vp9 => VideoCodec::Vp9,
            CodecArg::Av1 => VideoCodec::Av1,
        }
    }
}

impl RunArgs {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref source) = self.source {
            config.paths.source_dir = source.clone();
        }
        if let Some(ref output) = self.output {
            config.paths.output_dir = output.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.batch.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.batch.timeout_secs = timeout;
        }
    }
}

impl CompressArgs {
    pub fn apply(&self, config: &mut Config) {
        self.run.apply(config);
        let profile = &mut config.profile;
        if let Some(crf) = self.crf {
            profile.crf = crf;
        }
        if let Some(preset) = self.preset {
            profile.preset = preset;
        }
        if let Some(max_width) = self.max_width {
            profile.max_width = max_width;
        }
        if let Some(codec) = self.video_codec {
            profile.video_codec = codec.into();
        }
        if let Some(bitrate) = self.audio_bitrate {
            profile.audio_bitrate_kbps = bitrate;
        }
    }
}
