//! Encoder seam for the batch pipeline.
//!
//! The batch runner only knows the [`Encoder`] trait: "given an input file, a
//! profile and an output path, produce a playable file or fail". Two
//! implementations ship with the crate:
//!
//! - [`FfmpegEncoder`] re-encodes with the configured [`TranscodeProfile`]
//!   (H.264, CRF 28, `slower` preset, faststart, width capped at 1280, AAC
//!   128k by default) and reports progress from ffmpeg's `-progress` output.
//! - [`CopyEncoder`] publishes the input unchanged.
//!
//! # Example
//!
//! ```ignore
//! use mediapress_core::encoder::{Encoder, FfmpegEncoder, TranscodeJob};
//!
//! let encoder = FfmpegEncoder::with_defaults();
//! encoder.validate().await?;
//! encoder.encode(&job, None).await?;
//! ```

mod config;
mod copy;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::EncoderConfig;
pub use copy::CopyEncoder;
pub use error::EncoderError;
pub use ffmpeg::FfmpegEncoder;
pub use traits::Encoder;
pub use types::{
    AudioCodec, EncodeProgress, MediaFile, Preset, TranscodeJob, TranscodeProfile, VideoCodec,
};
