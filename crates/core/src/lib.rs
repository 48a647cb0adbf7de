pub mod batch;
pub mod config;
pub mod encoder;
pub mod report;
pub mod testing;

pub use batch::{
    discover_inputs, ensure_output_directory, run_job, BatchError, BatchEvent, BatchOptions,
    BatchRunner, JobError, JobOutcome, JobRecord, RunSummary, TranscodeResult,
};
pub use config::{
    load_config, load_config_from_str, validate_config, BatchConfig, Config, ConfigError,
    PathsConfig,
};
pub use encoder::{
    AudioCodec, CopyEncoder, EncodeProgress, Encoder, EncoderConfig, EncoderError,
    FfmpegEncoder, MediaFile, Preset, TranscodeJob, TranscodeProfile, VideoCodec,
};
