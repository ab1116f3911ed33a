//! Recursive collection of the publishable files under a root folder.
//!
//! Collection is best-effort: entries that cannot be read, that are not
//! regular files, or that exceed the size ceiling are skipped silently.
//! Only a root that cannot be statted or is not a directory is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::CollectError;

/// One publishable file, addressed both relative to the root (for the
/// backend key) and absolutely (for reading).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Slash-normalized path relative to the collection root.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
}

/// Walks `root` and returns every regular file whose size does not exceed
/// `max_size_bytes` (a ceiling of 0 disables the filter). Output is sorted
/// lexicographically by relative path so repeated runs are deterministic.
pub fn collect(root: &Path, max_size_bytes: u64) -> Result<Vec<FileEntry>, CollectError> {
    let root_meta = fs::metadata(root).map_err(|source| CollectError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    if !root_meta.is_dir() {
        return Err(CollectError::NotADirectory(root.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        // Symlinks and special files are not followed and not published.
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if max_size_bytes > 0 && meta.len() > max_size_bytes {
            debug!(path = %entry.path().display(), size = meta.len(), "Skipping oversize file");
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(FileEntry {
            relative_path,
            absolute_path: entry.into_path(),
            size_bytes: meta.len(),
        });
    }
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    info!(root = %root.display(), files = entries.len(), "Collected publishable files");
    Ok(entries)
}
