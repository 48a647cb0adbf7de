//! Types for the batch module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Computes `1 - output/input`. Negative when the output grew.
///
/// Returns `None` for an empty input, where the ratio is undefined.
pub fn savings_ratio(input_size: u64, output_size: u64) -> Option<f64> {
    if input_size == 0 {
        None
    } else {
        Some(1.0 - output_size as f64 / input_size as f64)
    }
}

/// Outcome of one successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeResult {
    /// Input size in bytes, read after the encode finished.
    pub input_size: u64,
    /// Output size in bytes.
    pub output_size: u64,
    /// `1 - output/input`, not clamped.
    pub savings: Option<f64>,
    /// Wall-clock encode time in milliseconds.
    pub duration_ms: u64,
    /// When the job finished.
    pub completed_at: DateTime<Utc>,
}

impl TranscodeResult {
    pub fn new(input_size: u64, output_size: u64, duration_ms: u64) -> Self {
        Self {
            input_size,
            output_size,
            savings: savings_ratio(input_size, output_size),
            duration_ms,
            completed_at: Utc::now(),
        }
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { result: TranscodeResult },
    Failed { reason: String },
    /// The batch was cancelled before this job started.
    Skipped,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub index: usize,
    pub file_name: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Input size at scan time.
    pub input_size: u64,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// Aggregate of one batch run, records in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Jobs that ran to completion, successfully or not.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Input bytes of successful jobs.
    pub total_input_bytes: u64,
    /// Output bytes of successful jobs.
    pub total_output_bytes: u64,
    pub records: Vec<JobRecord>,
}

impl RunSummary {
    /// Builds the summary. Records may arrive in any order.
    pub fn from_records(
        source_dir: PathBuf,
        output_dir: PathBuf,
        mut records: Vec<JobRecord>,
    ) -> Self {
        records.sort_by_key(|r| r.index);

        let mut summary = Self {
            source_dir,
            output_dir,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            total_input_bytes: 0,
            total_output_bytes: 0,
            records: Vec::new(),
        };

        for record in &records {
            match &record.outcome {
                JobOutcome::Succeeded { result } => {
                    summary.attempted += 1;
                    summary.succeeded += 1;
                    summary.total_input_bytes += result.input_size;
                    summary.total_output_bytes += result.output_size;
                }
                JobOutcome::Failed { .. } => {
                    summary.attempted += 1;
                    summary.failed += 1;
                }
                JobOutcome::Skipped => summary.skipped += 1,
            }
        }

        summary.records = records;
        summary
    }

    /// Whether any job failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Whether every discovered file was processed.
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }

    /// Savings across all successful jobs.
    pub fn total_savings(&self) -> Option<f64> {
        savings_ratio(self.total_input_bytes, self.total_output_bytes)
    }

    /// Failed records with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&JobRecord, &str)> {
        self.records.iter().filter_map(|r| match &r.outcome {
            JobOutcome::Failed { reason } => Some((r, reason.as_str())),
            _ => None,
        })
    }
}

/// Side-channel notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Discovered {
        total: usize,
    },
    JobStarted {
        index: usize,
        total: usize,
        file_name: String,
        input_size: u64,
    },
    JobProgress {
        index: usize,
        file_name: String,
        percent: f32,
    },
    JobSucceeded {
        index: usize,
        total: usize,
        file_name: String,
        result: TranscodeResult,
    },
    JobFailed {
        index: usize,
        total: usize,
        file_name: String,
        reason: String,
    },
    JobSkipped {
        index: usize,
        file_name: String,
    },
    Finished {
        attempted: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
}
