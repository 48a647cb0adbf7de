//! Mock encoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::encoder::{EncodeProgress, Encoder, EncoderError, TranscodeJob};

/// A recorded encode call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// The job that was submitted.
    pub job: TranscodeJob,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// Mock implementation of the Encoder trait.
///
/// Reads the input and writes an output whose size is `input * ratio`, so
/// savings are predictable without real media. Provides:
/// - Per-file failures by input file name
/// - Configurable size ratio and simulated encode time
/// - Progress updates at 0, 50 and 100 percent
/// - Recorded calls for assertions
///
/// # Example
///
/// ```rust,ignore
/// use mediapress_core::testing::MockEncoder;
///
/// let encoder = MockEncoder::new().with_ratio(0.5);
/// encoder.fail_file("b.mp4", "corrupt header").await;
///
/// let summary = BatchRunner::new(Arc::new(encoder), options).run().await?;
/// assert_eq!(summary.failed, 1);
/// ```
#[derive(Debug)]
pub struct MockEncoder {
    /// Output size as a fraction of input size.
    ratio: f64,
    /// Recorded encodes.
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Failure reasons keyed by input file name.
    failures: Arc<RwLock<HashMap<String, String>>>,
    /// Simulated encode time.
    delay: Duration,
    /// Whether a failed encode leaves a partial file behind.
    write_partial_on_failure: bool,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a mock that halves every file instantly.
    pub fn new() -> Self {
        Self {
            ratio: 0.5,
            encodes: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            delay: Duration::ZERO,
            write_partial_on_failure: true,
        }
    }

    /// Set the output/input size ratio.
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio.max(0.0);
        self
    }

    /// Set the simulated encode time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Choose whether failures leave a partial output file.
    pub fn with_partial_output(mut self, write: bool) -> Self {
        self.write_partial_on_failure = write;
        self
    }

    /// Make every encode of `file_name` fail with `reason`.
    pub async fn fail_file(&self, file_name: impl Into<String>, reason: impl Into<String>) {
        self.failures
            .write()
            .await
            .insert(file_name.into(), reason.into());
    }

    /// Get all recorded encodes.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Get the number of encodes performed.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    fn progress(percent: f32) -> EncodeProgress {
        EncodeProgress {
            percent,
            time_secs: None,
            duration_secs: None,
            speed: None,
        }
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn encode(
        &self,
        job: &TranscodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError> {
        if let Some(ref tx) = progress_tx {
            let _ = tx.try_send(Self::progress(0.0));
        }

        let failure = self
            .failures
            .read()
            .await
            .get(&job.input.file_name)
            .cloned();

        if let Some(reason) = failure {
            if self.write_partial_on_failure {
                tokio::fs::write(&job.output_path, b"partial").await?;
            }
            self.encodes.write().await.push(RecordedEncode {
                job: job.clone(),
                success: false,
            });
            return Err(EncoderError::encode_failed(reason, None));
        }

        let input = tokio::fs::read(&job.input.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncoderError::InputNotFound {
                    path: job.input.path.clone(),
                }
            } else {
                EncoderError::Io(e)
            }
        })?;

        if let Some(ref tx) = progress_tx {
            let _ = tx.try_send(Self::progress(50.0));
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let output_len = (input.len() as f64 * self.ratio).round() as usize;
        let output: Vec<u8> = input.iter().copied().cycle().take(output_len).collect();
        tokio::fs::write(&job.output_path, output).await?;

        if let Some(ref tx) = progress_tx {
            let _ = tx.try_send(Self::progress(100.0));
        }

        self.encodes.write().await.push(RecordedEncode {
            job: job.clone(),
            success: true,
        });
        Ok(())
    }
}
