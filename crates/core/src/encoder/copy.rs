//! Pass-through encoder that copies inputs unchanged.

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

use super::error::EncoderError;
use super::traits::Encoder;
use super::types::{EncodeProgress, TranscodeJob};

const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Copies each input byte-for-byte to its output path.
///
/// Used to publish source videos as-is when they are already web-ready.
pub struct CopyEncoder {
    buffer_size: usize,
}

impl Default for CopyEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyEncoder {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Sets the read/write buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

#[async_trait]
impl Encoder for CopyEncoder {
    fn name(&self) -> &str {
        "copy"
    }

    async fn encode(
        &self,
        job: &TranscodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError> {
        let source = File::open(&job.input.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncoderError::InputNotFound {
                    path: job.input.path.clone(),
                }
            } else {
                EncoderError::Io(e)
            }
        })?;
        let total = source.metadata().await?.len();
        let dest = File::create(&job.output_path).await?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source);
        let mut writer = BufWriter::with_capacity(self.buffer_size, dest);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut copied: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).await?;
            copied += n as u64;

            if let Some(ref tx) = progress_tx {
                let percent = if total > 0 {
                    (copied as f64 / total as f64 * 100.0).min(100.0) as f32
                } else {
                    100.0
                };
                let _ = tx.try_send(EncodeProgress {
                    percent,
                    time_secs: None,
                    duration_secs: None,
                    speed: None,
                });
            }
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        Ok(())
    }
}
