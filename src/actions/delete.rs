//! File deletion for collapsing a duplicate folder.
//!
//! # Overview
//!
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (explicit configuration)
//! - Batch deletion that carries on past per-file failures, then removes
//!   every parent directory the batch left empty
//!
//! # Example
//!
//! ```no_run
//! use foldupe::actions::delete::{delete_files, DeleteConfig};
//! use std::path::PathBuf;
//!
//! let paths = vec![PathBuf::from("/backup/photos/a.jpg")];
//! let result = delete_files(&paths, &DeleteConfig::trash());
//! println!("{}", result.summary());
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Only regular files are deleted.
    #[error("not a regular file: {0}")]
    NotARegularFile(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::NotARegularFile(p)
            | Self::TrashFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub path: PathBuf,
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

/// Results of a batch deletion.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their error messages.
    pub failures: Vec<(PathBuf, String)>,
    pub bytes_freed: u64,
    /// Parent directories removed because the batch emptied them.
    pub removed_dirs: Vec<PathBuf>,
}

impl BatchDeleteResult {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Deleted {} file(s), freed {}",
            self.success_count(),
            ByteSize(self.bytes_freed)
        );
        if !self.all_succeeded() {
            text.push_str(&format!(", {} failed", self.failure_count()));
        }
        if !self.removed_dirs.is_empty() {
            text.push_str(&format!(
                ", removed {} empty folder(s)",
                self.removed_dirs.len()
            ));
        }
        text
    }
}

/// Configuration for deletion operations.
#[derive(Debug, Clone, Default)]
pub struct DeleteConfig {
    /// Use permanent deletion instead of trash.
    pub permanent: bool,
}

impl DeleteConfig {
    /// Delete to the system trash.
    #[must_use]
    pub fn trash() -> Self {
        Self { permanent: false }
    }

    /// Delete permanently.
    #[must_use]
    pub fn permanent() -> Self {
        Self { permanent: true }
    }
}

fn regular_file_size(path: &Path) -> Result<u64, DeleteError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(DeleteError::NotARegularFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}

/// Move a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `NotARegularFile` for directories and symlinks
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = regular_file_size(path)?;

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: false,
    })
}

/// Permanently delete a single file.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `NotARegularFile` for directories and symlinks
/// - `PermissionDenied` / `Io` if removal fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = regular_file_size(path)?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::from_io(path, e)
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: true,
    })
}

/// Remove `dir` if it has no entries left.
///
/// Returns whether it was removed.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or removed.
pub fn remove_dir_if_empty(dir: &Path) -> io::Result<bool> {
    if fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir)?;
    log::info!("Removed empty folder {}", dir.display());
    Ok(true)
}

/// Delete every path, then try to remove each distinct parent directory.
///
/// Failures are recorded and the batch carries on.
pub fn delete_files(paths: &[PathBuf], config: &DeleteConfig) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();
    let mut parents = BTreeSet::new();

    for path in paths {
        let outcome = if config.permanent {
            permanent_delete(path)
        } else {
            delete_to_trash(path)
        };

        match outcome {
            Ok(deleted) => {
                result.bytes_freed += deleted.size;
                result.successes.push(deleted);
            }
            Err(e) => {
                log::warn!("Failed to delete {}: {}", path.display(), e);
                result.failures.push((path.clone(), e.to_string()));
            }
        }
        if let Some(parent) = path.parent() {
            parents.insert(parent.to_path_buf());
        }
    }

    // Deepest first, so a parent emptied by removing its child goes too
    for dir in parents.into_iter().rev() {
        match remove_dir_if_empty(&dir) {
            Ok(true) => result.removed_dirs.push(dir),
            Ok(false) => {}
            Err(e) => log::debug!("Keeping {}: {}", dir.display(), e),
        }
    }

    log::info!("{}", result.summary());
    result
}
