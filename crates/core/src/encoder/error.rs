//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while encoding a single file.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The encoder reported a failure (corrupt input, unsupported codec, crash).
    #[error("Encode failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// I/O error during encoding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encode was cancelled.
    #[error("Encode cancelled")]
    Cancelled,
}

impl EncoderError {
    /// Creates a new encode failed error with stderr output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Captured encoder diagnostics, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::EncodeFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_failed_display() {
        let err = EncoderError::encode_failed("corrupt header", Some("moov atom not found".into()));
        assert_eq!(err.to_string(), "Encode failed: corrupt header");
        assert_eq!(err.stderr(), Some("moov atom not found"));
    }

    #[test]
    fn test_io_conversion() {
        let err: EncoderError = std::io::Error::other("disk full").into();
        assert!(matches!(err, EncoderError::Io(_)));
        assert!(err.stderr().is_none());
    }
}
