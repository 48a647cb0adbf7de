//! Batch transcode orchestration.
//!
//! A run scans one source directory, prepares the output directory, pushes
//! every eligible file through an [`Encoder`](crate::encoder::Encoder) and
//! returns a [`RunSummary`]. One file's failure never stops the others.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediapress_core::batch::{BatchOptions, BatchRunner};
//! use mediapress_core::encoder::FfmpegEncoder;
//!
//! let runner = BatchRunner::new(
//!     Arc::new(FfmpegEncoder::with_defaults()),
//!     BatchOptions::new("public", "public/optimized-videos"),
//! );
//! let summary = runner.run().await?;
//! println!("{} of {} succeeded", summary.succeeded, summary.attempted);
//! ```

mod discovery;
mod error;
mod runner;
mod types;

pub use discovery::{discover_inputs, ensure_output_directory, is_eligible};
pub use error::{BatchError, JobError};
pub use runner::{run_job, BatchOptions, BatchRunner};
pub use types::{savings_ratio, BatchEvent, JobOutcome, JobRecord, RunSummary, TranscodeResult};
