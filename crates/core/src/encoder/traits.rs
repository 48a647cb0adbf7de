//! Trait definitions for the encoder module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::EncoderError;
use super::types::{EncodeProgress, TranscodeJob};

/// Anything that can turn `job.input` into a playable file at `job.output_path`.
///
/// The batch runner talks to encoders only through this trait, so swapping
/// ffmpeg for another backend (or a stub in tests) leaves orchestration alone.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Encodes one file.
    ///
    /// On success the output file exists at `job.output_path`. On error the
    /// output may be partially written and must be discarded by the caller.
    /// Progress updates are best effort; a full or closed channel is ignored.
    async fn encode(
        &self,
        job: &TranscodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError>;

    /// Validates that the encoder is properly configured and ready.
    async fn validate(&self) -> Result<(), EncoderError> {
        Ok(())
    }
}
