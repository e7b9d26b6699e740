//! Append-only hash log with an in-memory index.
//!
//! The whole log is replayed into a `HashMap` when opened. New entries are
//! appended immediately, so an interrupted run keeps every hash it finished.
//! One mutex guards both the map and the open log file; callers hold it only
//! for a lookup or an insert, never while reading file contents.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CacheEntry, CacheError, CacheResult};
use crate::scanner::Mtime;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<PathBuf, CacheEntry>,
    log: Option<File>,
}

/// Shared hash cache backed by an append-only log.
#[derive(Debug)]
pub struct HashCache {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl HashCache {
    /// Open (or create) the log at `path` and replay it.
    ///
    /// A final line without a newline is a torn write from an interrupted
    /// run; it is dropped and the file is truncated back to the last complete
    /// line.
    ///
    /// # Errors
    ///
    /// [`CacheError::Corrupt`] if any complete line is malformed,
    /// [`CacheError::Io`] if the file cannot be read or opened for appending.
    pub fn open(path: &Path) -> CacheResult<Self> {
        let io_err = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let data = match fs::read(path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(io_err(e)),
        };

        let mut entries = HashMap::new();
        let mut complete_len = 0;
        for (idx, line) in data.split_inclusive(|&b| b == b'\n').enumerate() {
            let Some(body) = line.strip_suffix(b"\n") else {
                break;
            };
            let entry = CacheEntry::parse_line(body).ok_or_else(|| CacheError::Corrupt {
                path: path.to_path_buf(),
                line: idx + 1,
            })?;
            entries.insert(entry.path.clone(), entry);
            complete_len += line.len();
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        if complete_len < data.len() {
            log::warn!(
                "Dropping torn final line of {} ({} bytes)",
                path.display(),
                data.len() - complete_len
            );
            log.set_len(complete_len as u64).map_err(io_err)?;
        }

        log::debug!("Loaded {} cached hashes from {}", entries.len(), path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            inner: Mutex::new(Inner {
                entries,
                log: Some(log),
            }),
        })
    }

    /// Open the log, starting over with an empty one if it is corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be read, removed or created.
    pub fn open_or_reset(path: &Path) -> CacheResult<Self> {
        match Self::open(path) {
            Err(e) if e.is_corrupt() => {
                log::warn!("{}; discarding hash log", e);
                fs::remove_file(path).map_err(|source| CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::open(path)
            }
            other => other,
        }
    }

    /// A cache that is never persisted.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Path of the backing log, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached hash for `path`, if its size and mtime are unchanged.
    #[must_use]
    pub fn lookup(&self, path: &Path, size: u64, mtime: Mtime) -> Option<String> {
        let inner = self.lock();
        let entry = inner.entries.get(path)?;
        if entry.matches(size, mtime) {
            log::trace!("Cache hit: {}", path.display());
            Some(entry.hash.clone())
        } else {
            log::trace!("Cache stale: {}", path.display());
            None
        }
    }

    /// Record a hash in memory and append it to the log.
    ///
    /// The in-memory table is updated even if the append fails.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the log append fails.
    pub fn insert(&self, entry: CacheEntry) -> CacheResult<()> {
        let line = entry.to_line();
        let mut inner = self.lock();
        inner.entries.insert(entry.path.clone(), entry);

        let (Some(line), Some(log)) = (line, inner.log.as_mut()) else {
            return Ok(());
        };
        log.write_all(&line).map_err(|source| CacheError::Io {
            path: self.path.clone().unwrap_or_default(),
            source,
        })
    }

    /// Number of distinct cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
