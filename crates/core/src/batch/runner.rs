//! Batch runner: discovery, job execution and aggregation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::discovery::{discover_inputs, ensure_output_directory};
use super::error::{BatchError, JobError};
use super::types::{BatchEvent, JobOutcome, JobRecord, RunSummary, TranscodeResult};
use crate::encoder::{EncodeProgress, Encoder, TranscodeJob, TranscodeProfile};

/// Capacity of the per-job progress channel between encoder and runner.
const PROGRESS_BUFFER_SIZE: usize = 16;

/// Parameters of one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Eligible file extension, without the dot.
    pub extension: String,
    /// Maximum number of jobs running at once. 1 runs strictly in order.
    pub concurrency: usize,
    /// Per-job time limit.
    pub job_timeout: Option<Duration>,
    pub profile: TranscodeProfile,
}

impl BatchOptions {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            extension: "mp4".to_string(),
            concurrency: 1,
            job_timeout: None,
            profile: TranscodeProfile::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    pub fn with_profile(mut self, profile: TranscodeProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

/// Runs one job to completion and measures the result.
///
/// On any failure the output file is removed, so a file left at
/// `job.output_path` always belongs to a successful job.
pub async fn run_job(
    encoder: &dyn Encoder,
    job: &TranscodeJob,
    timeout: Option<Duration>,
    progress_tx: Option<mpsc::Sender<EncodeProgress>>,
) -> Result<TranscodeResult, JobError> {
    let start = Instant::now();

    let result = encode_with_timeout(encoder, job, timeout, progress_tx).await;
    let result = match result {
        Ok(()) => measure(job, start).await,
        Err(e) => Err(e),
    };

    if result.is_err() {
        discard_partial_output(&job.output_path).await;
    }

    result
}

async fn encode_with_timeout(
    encoder: &dyn Encoder,
    job: &TranscodeJob,
    timeout: Option<Duration>,
    progress_tx: Option<mpsc::Sender<EncodeProgress>>,
) -> Result<(), JobError> {
    let encode = encoder.encode(job, progress_tx);
    match timeout {
        // Dropping the encode future on expiry kills the encoder process
        Some(limit) => match tokio::time::timeout(limit, encode).await {
            Ok(result) => result.map_err(JobError::from),
            Err(_) => Err(JobError::Timeout {
                timeout_secs: limit.as_secs(),
            }),
        },
        None => encode.await.map_err(JobError::from),
    }
}

async fn measure(job: &TranscodeJob, start: Instant) -> Result<TranscodeResult, JobError> {
    let output_meta = tokio::fs::metadata(&job.output_path)
        .await
        .map_err(|e| JobError::WriteFailed {
            path: job.output_path.clone(),
            source: e,
        })?;

    let input_size = match tokio::fs::metadata(&job.input.path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            debug!(file = %job.input.file_name, error = %e, "Using scan-time input size");
            job.input.size_bytes
        }
    };

    Ok(TranscodeResult::new(
        input_size,
        output_meta.len(),
        start.elapsed().as_millis() as u64,
    ))
}

async fn discard_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

/// Delivers a lifecycle event, waiting for room in the channel.
///
/// Only `JobProgress` is best effort. A closed receiver is ignored.
async fn notify(events: &Option<mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        if tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Drives a whole batch: scan, prepare, encode every file, summarize.
pub struct BatchRunner {
    encoder: Arc<dyn Encoder>,
    options: BatchOptions,
    events: Option<mpsc::Sender<BatchEvent>>,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(encoder: Arc<dyn Encoder>, options: BatchOptions) -> Self {
        Self {
            encoder,
            options,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sends batch events to `tx`.
    ///
    /// Lifecycle events wait for the receiver. `JobProgress` is dropped when the
    /// channel is full.
    pub fn with_events(mut self, tx: mpsc::Sender<BatchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Uses `cancel` to stop starting new jobs.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Runs the batch.
    ///
    /// Only directory-level problems are returned as errors. Per-file failures
    /// end up in the summary and never stop the remaining jobs.
    pub async fn run(&self) -> Result<RunSummary, BatchError> {
        let options = &self.options;
        let files = discover_inputs(&options.source_dir, &options.extension).await?;
        let total = files.len();
        info!(
            encoder = self.encoder.name(),
            source = %options.source_dir.display(),
            count = total,
            "Found video(s) to process"
        );
        notify(&self.events, BatchEvent::Discovered { total }).await;

        ensure_output_directory(&options.output_dir).await?;
        self.check_output_is_not_source().await?;

        let jobs: Vec<TranscodeJob> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                TranscodeJob::new(index, file, &options.output_dir, options.profile.clone())
            })
            .collect();

        // Every job starts out with a record so a crashed task still yields one
        let mut records: Vec<JobRecord> = jobs
            .iter()
            .map(|job| JobRecord {
                index: job.index,
                file_name: job.input.file_name.clone(),
                input_path: job.input.path.clone(),
                output_path: job.output_path.clone(),
                input_size: job.input.size_bytes,
                outcome: JobOutcome::Failed {
                    reason: "job did not complete".to_string(),
                },
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                info!(file = %job.input.file_name, "Batch cancelled, skipping");
                notify(
                    &self.events,
                    BatchEvent::JobSkipped {
                        index: job.index,
                        file_name: job.input.file_name.clone(),
                    },
                )
                .await;
                records[job.index].outcome = JobOutcome::Skipped;
                continue;
            };

            let encoder = Arc::clone(&self.encoder);
            let events = self.events.clone();
            let timeout = options.job_timeout;

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = execute(encoder.as_ref(), &job, total, timeout, events).await;
                (job.index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => records[index].outcome = outcome,
                Err(e) => error!(error = %e, "Job task aborted"),
            }
        }

        let summary = RunSummary::from_records(
            options.source_dir.clone(),
            options.output_dir.clone(),
            records,
        );

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch finished"
        );
        notify(
            &self.events,
            BatchEvent::Finished {
                attempted: summary.attempted,
                succeeded: summary.succeeded,
                failed: summary.failed,
                skipped: summary.skipped,
            },
        )
        .await;

        Ok(summary)
    }

    async fn check_output_is_not_source(&self) -> Result<(), BatchError> {
        let output = tokio::fs::canonicalize(&self.options.output_dir)
            .await
            .map_err(|e| BatchError::scan(&self.options.output_dir, e))?;
        let source = tokio::fs::canonicalize(&self.options.source_dir)
            .await
            .map_err(|e| BatchError::scan(&self.options.source_dir, e))?;

        if output == source {
            return Err(BatchError::OutputIsSource { path: output });
        }
        Ok(())
    }
}

/// Runs one job inside the batch, reporting through `events`.
async fn execute(
    encoder: &dyn Encoder,
    job: &TranscodeJob,
    total: usize,
    timeout: Option<Duration>,
    events: Option<mpsc::Sender<BatchEvent>>,
) -> JobOutcome {
    let file_name = job.input.file_name.clone();
    info!(
        file = %file_name,
        position = job.index + 1,
        total,
        input_bytes = job.input.size_bytes,
        "Processing"
    );
    notify(
        &events,
        BatchEvent::JobStarted {
            index: job.index,
            total,
            file_name: file_name.clone(),
            input_size: job.input.size_bytes,
        },
    )
    .await;

    let (progress_tx, forwarder) = match events.clone() {
        Some(events_tx) => {
            let (tx, mut rx) = mpsc::channel::<EncodeProgress>(PROGRESS_BUFFER_SIZE);
            let index = job.index;
            let file_name = file_name.clone();
            let handle = tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    let _ = events_tx.try_send(BatchEvent::JobProgress {
                        index,
                        file_name: file_name.clone(),
                        percent: progress.percent,
                    });
                }
            });
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    let result = run_job(encoder, job, timeout, progress_tx).await;

    // The encoder has dropped its sender, so the forwarder drains and stops
    if let Some(handle) = forwarder {
        let _ = handle.await;
    }

    match result {
        Ok(result) => {
            info!(
                file = %file_name,
                input_bytes = result.input_size,
                output_bytes = result.output_size,
                savings = ?result.savings,
                "Compression complete"
            );
            notify(
                &events,
                BatchEvent::JobSucceeded {
                    index: job.index,
                    total,
                    file_name,
                    result: result.clone(),
                },
            )
            .await;
            JobOutcome::Succeeded { result }
        }
        Err(e) => {
            let reason = e.to_string();
            error!(file = %file_name, error = %reason, "Error processing file");
            notify(
                &events,
                BatchEvent::JobFailed {
                    index: job.index,
                    total,
                    file_name,
                    reason: reason.clone(),
                },
            )
            .await;
            JobOutcome::Failed { reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderError, MediaFile};
    use async_trait::async_trait;
    use std::fs;
    use tempfile::tempdir;

    /// Writes half the input, or fails for names listed in `fail`.
    struct HalvingEncoder {
        fail: Vec<&'static str>,
        write_partial_on_failure: bool,
    }

    #[async_trait]
    impl Encoder for HalvingEncoder {
        fn name(&self) -> &str {
            "halving"
        }

        async fn encode(
            &self,
            job: &TranscodeJob,
            _progress_tx: Option<mpsc::Sender<EncodeProgress>>,
        ) -> Result<(), EncoderError> {
            if self.fail.contains(&job.input.file_name.as_str()) {
                if self.write_partial_on_failure {
                    tokio::fs::write(&job.output_path, b"partial").await?;
                }
                return Err(EncoderError::encode_failed("corrupt header", None));
            }
            let data = tokio::fs::read(&job.input.path).await?;
            tokio::fs::write(&job.output_path, &data[..data.len() / 2]).await?;
            Ok(())
        }
    }

    /// Claims success without writing anything.
    struct ForgetfulEncoder;

    #[async_trait]
    impl Encoder for ForgetfulEncoder {
        fn name(&self) -> &str {
            "forgetful"
        }

        async fn encode(
            &self,
            _job: &TranscodeJob,
            _progress_tx: Option<mpsc::Sender<EncodeProgress>>,
        ) -> Result<(), EncoderError> {
            Ok(())
        }
    }

    /// Never finishes.
    struct HangingEncoder;

    #[async_trait]
    impl Encoder for HangingEncoder {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn encode(
            &self,
            job: &TranscodeJob,
            _progress_tx: Option<mpsc::Sender<EncodeProgress>>,
        ) -> Result<(), EncoderError> {
            tokio::fs::write(&job.output_path, b"half-written").await?;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn job_in(dir: &Path, name: &str, bytes: usize) -> TranscodeJob {
        let input = dir.join(name);
        fs::write(&input, vec![7u8; bytes]).unwrap();
        let out = dir.join("out");
        fs::create_dir_all(&out).unwrap();
        TranscodeJob::new(
            0,
            MediaFile {
                path: input,
                file_name: name.to_string(),
                size_bytes: bytes as u64,
            },
            &out,
            TranscodeProfile::default(),
        )
    }

    #[tokio::test]
    async fn test_run_job_measures_output() {
        let dir = tempdir().unwrap();
        let job = job_in(dir.path(), "a.mp4", 1000);
        let encoder = HalvingEncoder {
            fail: vec![],
            write_partial_on_failure: false,
        };

        let result = run_job(&encoder, &job, None, None).await.unwrap();
        assert_eq!(result.input_size, 1000);
        assert_eq!(result.output_size, 500);
        assert_eq!(result.savings, Some(0.5));
    }

    #[tokio::test]
    async fn test_run_job_failure_removes_partial_output() {
        let dir = tempdir().unwrap();
        let job = job_in(dir.path(), "b.mp4", 100);
        let encoder = HalvingEncoder {
            fail: vec!["b.mp4"],
            write_partial_on_failure: true,
        };

        let err = run_job(&encoder, &job, None, None).await.unwrap_err();
        assert!(matches!(err, JobError::Encode(EncoderError::EncodeFailed { .. })));
        assert!(!job.output_path.exists());
    }

    #[tokio::test]
    async fn test_run_job_missing_output_is_write_failure() {
        let dir = tempdir().unwrap();
        let job = job_in(dir.path(), "a.mp4", 10);
        let err = run_job(&ForgetfulEncoder, &job, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_job_timeout() {
        let dir = tempdir().unwrap();
        let job = job_in(dir.path(), "a.mp4", 10);
        let err = run_job(&HangingEncoder, &job, Some(Duration::from_millis(50)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Timeout { .. }));
        assert!(!job.output_path.exists());
    }

    #[tokio::test]
    async fn test_batch_rejects_output_equal_to_source() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        let runner = BatchRunner::new(
            Arc::new(ForgetfulEncoder),
            BatchOptions::new(dir.path(), dir.path()),
        );
        assert!(matches!(
            runner.run().await,
            Err(BatchError::OutputIsSource { .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_cancelled_before_start_skips_everything() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.mp4"), b"xx").unwrap();
        fs::write(src.join("b.mp4"), b"yy").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = BatchRunner::new(
            Arc::new(HalvingEncoder {
                fail: vec![],
                write_partial_on_failure: false,
            }),
            BatchOptions::new(&src, dir.path().join("out")),
        )
        .with_cancellation(cancel);

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.attempted, 0);
        assert!(!summary.is_complete());
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
    }
}
