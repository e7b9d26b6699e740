//! Content hashing for candidate verification.
//!
//! This module provides functionality for:
//! - Streaming BLAKE3 file hashing with byte-interval progress ([`hasher`])
//! - One hashing worker per storage device ([`pool`])
//! - Pairing two folders' files by hash ([`verify`])
//!
//! Hashes are requested on demand for the folders of a candidate, cached in
//! the durable [`HashCache`](crate::cache::HashCache) and written into each
//! folder's hash table as they complete.

pub mod hasher;
pub mod pool;
pub mod verify;

use std::io;
use std::path::{Path, PathBuf};

pub use hasher::{encode_digest, Hasher};
pub use pool::{file_stats, stat_folder_files, FileStat, HashWorkerPool, PoolStats};
pub use verify::{compare_folders, FolderComparison, VerifyState};

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for a path.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}
