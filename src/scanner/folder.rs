//! Folder records produced by a scan.
//!
//! A [`FolderRecord`] is a directory path plus the size of every regular,
//! non-empty file directly inside it, in listing order. Records are shared
//! as [`FolderRef`] (`Arc<FolderRecord>`): candidates, the snapshot codec and
//! the hashing pool all key off the *same* instance, so two references to one
//! folder must always be `Arc::ptr_eq`.
//!
//! The only mutable part of a record is its hash table, which the hashing
//! pool fills in lazily while the operator verifies candidates.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// A folder must hold strictly more than this many bytes to qualify.
pub const MIN_FOLDER_BYTES: u64 = MIB;

/// Folders at or above this size qualify even with few files.
pub const LARGE_FOLDER_BYTES: u64 = 512 * MIB;

/// A folder below [`LARGE_FOLDER_BYTES`] needs strictly more files than this.
pub const MIN_FILE_COUNT: usize = 2;

/// Modification time in nanoseconds since the Unix epoch.
pub type Mtime = u64;

/// Shared handle to a folder record. Identity matters, see module docs.
pub type FolderRef = Arc<FolderRecord>;

/// Extract the modification time of a file as [`Mtime`].
///
/// Times before the epoch (or unavailable on the platform) collapse to 0.
#[must_use]
pub fn mtime_of(metadata: &Metadata) -> Mtime {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Progress of a single file's verification hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashState {
    /// Requested, not yet computed.
    Pending,
    /// Base64 digest of the whole file.
    Computed(String),
    /// Hashing failed; the reason is kept for display.
    Failed(String),
}

/// Entry in a folder's hash table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    /// Size at the time the hash was requested.
    pub size: u64,
    /// Modification time at the time the hash was requested.
    pub mtime: Mtime,
    /// Hash progress.
    pub state: HashState,
}

impl FileHash {
    /// Create a pending entry.
    #[must_use]
    pub fn pending(size: u64, mtime: Mtime) -> Self {
        Self {
            size,
            mtime,
            state: HashState::Pending,
        }
    }

    /// The computed digest, if any.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        match &self.state {
            HashState::Computed(hash) => Some(hash),
            _ => None,
        }
    }

    /// Whether the hash is still being computed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == HashState::Pending
    }
}

/// A directory and the sizes of the files directly inside it.
#[derive(Debug)]
pub struct FolderRecord {
    path: PathBuf,
    files: Vec<u64>,
    hashes: Mutex<HashMap<OsString, FileHash>>,
}

impl FolderRecord {
    /// Create a record.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path of the folder
    /// * `files` - Sizes of the direct regular files, in listing order
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, files: Vec<u64>) -> Self {
        Self {
            path: path.into(),
            files,
            hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Create a shared record.
    #[must_use]
    pub fn shared(path: impl Into<PathBuf>, files: Vec<u64>) -> FolderRef {
        Arc::new(Self::new(path, files))
    }

    /// Whether a folder with these file sizes is worth keeping in a scan.
    ///
    /// Requires files, more than [`MIN_FOLDER_BYTES`] in total, and either more
    /// than [`MIN_FILE_COUNT`] files or at least [`LARGE_FOLDER_BYTES`].
    #[must_use]
    pub fn qualifies(files: &[u64]) -> bool {
        if files.is_empty() {
            return false;
        }
        let total: u64 = files.iter().sum();
        total > MIN_FOLDER_BYTES && (files.len() > MIN_FILE_COUNT || total >= LARGE_FOLDER_BYTES)
    }

    /// Absolute path of the folder.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File sizes in listing order.
    #[must_use]
    pub fn files(&self) -> &[u64] {
        &self.files
    }

    /// Number of files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Sum of all file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().sum()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<OsString, FileHash>> {
        self.hashes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the hash entry for a file name.
    #[must_use]
    pub fn hash_entry(&self, name: impl AsRef<OsStr>) -> Option<FileHash> {
        self.table().get(name.as_ref()).cloned()
    }

    /// Copy of the whole hash table, keyed by raw file name.
    #[must_use]
    pub fn hashes(&self) -> HashMap<OsString, FileHash> {
        self.table().clone()
    }

    /// Insert or replace the hash entry for a file name.
    pub fn set_hash(&self, name: impl AsRef<OsStr>, entry: FileHash) {
        self.table().insert(name.as_ref().to_os_string(), entry);
    }

    /// Mark a file as requested but not yet hashed.
    pub fn mark_pending(&self, name: impl AsRef<OsStr>, size: u64, mtime: Mtime) {
        self.set_hash(name, FileHash::pending(size, mtime));
    }

    /// Number of entries still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table().values().filter(|e| e.is_pending()).count()
    }
}
