//! Source directory scan and output directory preparation.

use std::path::Path;
use tracing::{debug, warn};

use super::error::BatchError;
use crate::encoder::MediaFile;

/// Whether `file_name` is an eligible input for `extension` (without the dot).
///
/// Matching is case-sensitive and hidden files are ignored.
pub fn is_eligible(file_name: &str, extension: &str) -> bool {
    if file_name.starts_with('.') {
        return false;
    }
    file_name
        .strip_suffix(extension)
        .is_some_and(|stem| stem.ends_with('.'))
}

/// Lists the eligible files at the top level of `source_dir`.
///
/// Files come back in directory listing order, which is not stable across
/// platforms; use it for progress numbering only.
pub async fn discover_inputs(
    source_dir: &Path,
    extension: &str,
) -> Result<Vec<MediaFile>, BatchError> {
    let metadata = tokio::fs::metadata(source_dir)
        .await
        .map_err(|e| BatchError::scan(source_dir, e))?;
    if !metadata.is_dir() {
        return Err(BatchError::NotADirectory {
            path: source_dir.to_path_buf(),
        });
    }

    let root = tokio::fs::canonicalize(source_dir)
        .await
        .map_err(|e| BatchError::scan(source_dir, e))?;
    let mut entries = tokio::fs::read_dir(&root)
        .await
        .map_err(|e| BatchError::scan(source_dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BatchError::scan(source_dir, e))?
    {
        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                debug!(name = ?raw, "Skipping non UTF-8 file name");
                continue;
            }
        };

        if !is_eligible(&file_name, extension) {
            continue;
        }

        // Follows symlinks, so a link to a regular file counts
        let path = entry.path();
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }

        files.push(MediaFile {
            path,
            file_name,
            size_bytes: meta.len(),
        });
    }

    debug!(dir = %root.display(), count = files.len(), "Scanned source directory");
    Ok(files)
}

/// Creates `path` and any missing parents. Succeeds if it already exists.
pub async fn ensure_output_directory(path: &Path) -> Result<(), BatchError> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            BatchError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            BatchError::OutputDirectory {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}
