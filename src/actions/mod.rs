//! Actions that collapse a verified duplicate folder.
//!
//! This module provides functionality for:
//! - Deleting files to the trash or permanently, then removing emptied folders
//! - Replacing files with symlinks to their verified twins
//! - Copying modification times across verified pairs
//! - Renaming files to match their twins, never overwriting
//!
//! Every multi-file action except deletion validates all of its inputs before
//! touching the filesystem, so a bad pair aborts the action without partial
//! changes.
//!
//! ```no_run
//! use foldupe::actions::rename::rename_to_match;
//! use std::path::PathBuf;
//!
//! let pairs = vec![(
//!     PathBuf::from("/backup/show/ep1.mkv"),
//!     PathBuf::from("/backup/show/Episode 1.mkv"),
//! )];
//! rename_to_match(&pairs).expect("rename refused");
//! ```

pub mod delete;
pub mod link;
pub mod mtime;
pub mod rename;

use std::io;
use std::path::{Path, PathBuf};

// Re-export commonly used types
pub use delete::{
    delete_files, delete_to_trash, permanent_delete, remove_dir_if_empty, BatchDeleteResult,
    DeleteConfig, DeleteError, DeleteResult,
};
pub use link::replace_with_symlinks;
pub use mtime::sync_mtimes;
pub use rename::rename_to_match;

/// Errors from the link, mtime and rename actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The destination already exists; nothing is overwritten.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// A source or target file is missing.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotARegularFile(PathBuf),

    /// The two file lists cannot be paired.
    #[error("cannot pair files: {0}")]
    PairingMismatch(String),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    pub(crate) fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Fail unless `path` is a regular file (symlinks are not followed).
pub(crate) fn require_regular_file(path: &Path) -> Result<std::fs::Metadata, ActionError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| ActionError::from_io(path, e))?;
    if metadata.is_file() {
        Ok(metadata)
    } else {
        Err(ActionError::NotARegularFile(path.to_path_buf()))
    }
}
