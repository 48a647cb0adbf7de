use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::BatchOptions;
use crate::encoder::{EncoderConfig, TranscodeProfile};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub profile: TranscodeProfile,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl Config {
    /// Options for one batch run built from this configuration.
    pub fn batch_options(&self) -> BatchOptions {
        let mut options = BatchOptions::new(&self.paths.source_dir, &self.paths.output_dir)
            .with_concurrency(self.batch.concurrency)
            .with_extension(self.batch.extension.clone())
            .with_profile(self.profile.clone());
        if let Some(timeout) = self.batch.job_timeout() {
            options = options.with_timeout(timeout);
        }
        options
    }
}

/// Where videos are read from and written to
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public/optimized-videos")
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Eligible file extension, without the dot (case-sensitive)
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Jobs running at once (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-job timeout in seconds (0 = no timeout)
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            concurrency: default_concurrency(),
            timeout_secs: 0,
        }
    }
}

impl BatchConfig {
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_extension() -> String {
    "mp4".to_string()
}

fn default_concurrency() -> usize {
    1
}
