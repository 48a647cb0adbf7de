//! Testing utilities.
//!
//! [`MockEncoder`] stands in for ffmpeg so batch behavior can be tested
//! without media files. The [`fixtures`] module builds source directories.

mod mock_encoder;

pub use mock_encoder::{MockEncoder, RecordedEncode};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// One megabyte, as used in size reports.
    pub const MB: u64 = 1024 * 1024;

    /// Writes `name` with `size` bytes of filler into `dir`.
    pub fn write_video(dir: &Path, name: &str, size: u64) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, vec![0x42u8; size as usize])?;
        Ok(path)
    }
}
