//! Error types for the batch module.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::encoder::EncoderError;

/// Errors that abort the whole run before any job starts.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Source directory does not exist.
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Directory exists but cannot be read or written.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Source path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output directory resolves to the source directory.
    #[error("Output directory is the source directory: {path}")]
    OutputIsSource { path: PathBuf },

    /// Any other I/O error during the scan.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BatchError {
    /// Maps an error raised while scanning `path`.
    pub(crate) fn scan(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::DirectoryNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Errors confined to a single job. The batch records them and moves on.
#[derive(Debug, Error)]
pub enum JobError {
    /// The encoder reported a failure.
    #[error(transparent)]
    Encode(#[from] EncoderError),

    /// The encoder did not finish within the per-job timeout.
    #[error("Encode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The encoder claimed success but the output is missing or unreadable.
    #[error("Failed to write output {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
