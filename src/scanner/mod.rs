//! Scanner module for directory traversal and folder listings.
//!
//! This module provides functionality for:
//! - Device-bounded, post-order directory walking ([`DirectoryScanner`])
//! - Folder qualification and [`FolderRecord`] construction
//! - One-level folder listings for side-by-side views and the dupe tree
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`folder`]: Folder records and their attached hash tables
//! - [`walker`]: Recursive walk with mountpoint and cancellation handling
//! - [`listing`]: Sorted single-directory listings
//! - [`device`]: Platform device-id extraction
//!
//! # Example
//!
//! ```no_run
//! use foldupe::scanner::DirectoryScanner;
//! use std::path::Path;
//!
//! let scanner = DirectoryScanner::new();
//! let report = scanner.scan(Path::new("/srv/media")).expect("scan cancelled");
//! for folder in &report.folders {
//!     println!("{} ({} files)", folder.path().display(), folder.file_count());
//! }
//! for err in &report.errors {
//!     eprintln!("Warning: {}", err);
//! }
//! ```

pub mod device;
pub mod folder;
pub mod listing;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

// Re-export main types
pub use folder::{mtime_of, FileHash, FolderRecord, FolderRef, HashState, Mtime, MIB};
pub use listing::{list_folder, EntryKind, ListingEntry};
pub use walker::DirectoryScanner;

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when listing or stating an entry.
    #[error("Permission denied: {0}")]
    AccessDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Any other I/O error while listing or stating an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The scan was interrupted by the shutdown flag.
    #[error("Scan interrupted by user")]
    Cancelled,
}

impl ScanError {
    /// Classify an I/O error for a path.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::AccessDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::AccessDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => Some(p),
            Self::Io { path, .. } => Some(path),
            Self::Cancelled => None,
        }
    }
}

/// Outcome of scanning one or more roots.
///
/// Access errors are collected here rather than aborting the walk; only
/// cancellation is returned as an `Err` by the scanner.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Qualifying folders, in walk order.
    pub folders: Vec<FolderRef>,
    /// Non-fatal errors hit while listing or stating entries.
    pub errors: Vec<ScanError>,
    /// Entries on a different device than their scan root.
    pub skipped_mounts: Vec<PathBuf>,
}

impl ScanReport {
    /// Append another report (used when scanning several roots).
    pub fn merge(&mut self, other: ScanReport) {
        self.folders.extend(other.folders);
        self.errors.extend(other.errors);
        self.skipped_mounts.extend(other.skipped_mounts);
    }

    /// Whether any access error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
