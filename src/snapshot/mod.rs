//! Persisted scan snapshots and dupe sets.
//!
//! Both are stored as zstd-compressed line streams:
//!
//! ```text
//! p /srv/media/film
//! f 1048576 2097152 3145728
//! d 666 0 1
//! eof
//! ```
//!
//! `p`/`f` pairs declare folders in emission order, `d` lines reference them
//! by 0-based index with the score in truncated permille, and `eof` ends the
//! stream. Two `d` lines naming the same index load as the same
//! [`FolderRef`](crate::scanner::FolderRef) instance.

pub mod codec;
pub mod store;

pub use codec::{read_stream, write_dupes, write_folders, Decoded};
pub use store::SnapshotStore;

/// Errors that can occur while reading or writing snapshots.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    /// The stream is malformed; the file should be discarded and regenerated.
    #[error("Corrupt snapshot at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number, or 0 for stream-level failures
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// An I/O error occurred.
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// Whether this error means the stored data is unusable.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
