//! Durable hash cache.
//!
//! This module keeps one content hash per file path so that verification does
//! not re-read files that have not changed.
//!
//! # Architecture
//!
//! * [`hash_log`]: The append-only log on disk and its in-memory replay.
//! * [`entry`]: The cached record and its line format.
//!
//! # Cache Invalidation
//!
//! An entry is reused only while both of these still match the file:
//! * File size
//! * Modification time (nanoseconds)
//!
//! Otherwise the file is hashed again and a newer entry is appended. When the
//! log is replayed, later lines for a path override earlier ones.

pub mod entry;
pub mod hash_log;

use std::path::PathBuf;

pub use entry::CacheEntry;
pub use hash_log::HashCache;

/// Errors that can occur while opening or writing the hash log.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// A complete line of the log could not be parsed.
    #[error("Corrupt hash log {path} at line {line}")]
    Corrupt {
        /// Log file
        path: PathBuf,
        /// 1-based line number
        line: usize,
    },

    /// An I/O error occurred on the log file.
    #[error("Hash log I/O error for {path}: {source}")]
    Io {
        /// Log file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Whether the log should be discarded and rebuilt.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
