//! Per-device hashing workers.
//!
//! # Overview
//!
//! [`HashWorkerPool`] keeps one queue and one worker thread per storage
//! device, created the first time a request touches that device. Requests
//! for one device are hashed strictly in submission order, which keeps reads
//! sequential on spinning disks; different devices hash in parallel.
//!
//! # Request lifecycle
//!
//! 1. [`HashWorkerPool::request`] marks every requested file `Pending` in the
//!    folder's hash table and queues it. It returns immediately.
//! 2. The worker reuses a cached hash when size and mtime still match, or
//!    streams the file through the [`Hasher`] and appends the result to the
//!    [`HashCache`].
//! 3. The folder's entry becomes `Computed` or `Failed`.
//!
//! # Termination
//!
//! [`HashWorkerPool::terminate`] queues a stop signal behind the existing
//! work of every device and waits until each queue has drained. A hash in
//! progress is never interrupted.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{HashError, Hasher};
use crate::cache::{CacheEntry, HashCache};
use crate::scanner::device::device_of;
use crate::scanner::{list_folder, FileHash, FolderRef, HashState, ListingEntry, Mtime};

/// Sleep between queue checks while terminating.
const TERMINATE_POLL: Duration = Duration::from_millis(10);

/// A file to hash, relative to its folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Raw file name inside the folder.
    pub name: OsString,
    pub size: u64,
    pub mtime: Mtime,
}

/// The regular, non-empty files of a folder listing.
#[must_use]
pub fn file_stats(entries: &[ListingEntry]) -> Vec<FileStat> {
    entries
        .iter()
        .filter(|e| e.is_file() && e.size > 0)
        .map(|e| FileStat {
            name: e.name.clone(),
            size: e.size,
            mtime: e.mtime,
        })
        .collect()
}

/// Stat the regular, non-empty files directly inside a folder.
///
/// # Errors
///
/// Returns an error if the folder cannot be listed.
pub fn stat_folder_files(path: &Path) -> io::Result<Vec<FileStat>> {
    Ok(file_stats(&list_folder(path)?))
}

enum Job {
    Hash { folder: FolderRef, file: FileStat },
    Stop,
}

struct Lane {
    sender: Sender<Job>,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Counters {
    files_hashed: AtomicUsize,
    cache_hits: AtomicUsize,
    failures: AtomicUsize,
    bytes_hashed: AtomicU64,
}

/// Snapshot of the pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Files read and hashed.
    pub files_hashed: usize,
    /// Files answered from the cache.
    pub cache_hits: usize,
    /// Files that could not be hashed.
    pub failures: usize,
    /// Bytes read while hashing.
    pub bytes_hashed: u64,
}

/// State shared by every worker.
struct Shared {
    cache: Arc<HashCache>,
    hasher: Hasher,
    counters: Counters,
}

/// One hashing worker per device.
pub struct HashWorkerPool {
    shared: Arc<Shared>,
    lanes: Mutex<HashMap<u64, Lane>>,
}

impl std::fmt::Debug for HashWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashWorkerPool")
            .field("devices", &self.device_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl HashWorkerPool {
    #[must_use]
    pub fn new(cache: Arc<HashCache>, hasher: Hasher) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                hasher,
                counters: Counters::default(),
            }),
            lanes: Mutex::new(HashMap::new()),
        }
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<u64, Lane>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of devices with a live worker.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.lanes().len()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            files_hashed: c.files_hashed.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            bytes_hashed: c.bytes_hashed.load(Ordering::Relaxed),
        }
    }

    /// Fill a folder's hash table from the cache without queuing any work.
    ///
    /// Returns how many files had a valid cached hash.
    pub fn attach_cached(&self, folder: &FolderRef, files: &[FileStat]) -> usize {
        let mut attached = 0;
        for file in files {
            let path = folder.path().join(&file.name);
            if let Some(hash) = self.shared.cache.lookup(&path, file.size, file.mtime) {
                folder.set_hash(&file.name, computed(file, hash));
                attached += 1;
            }
        }
        attached
    }

    /// Queue `files` of `folder` for hashing and return immediately.
    ///
    /// The device is taken from the first file, falling back to the folder.
    /// Every file is marked `Pending` before this returns.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be determined or a worker cannot be
    /// started. Files that could not be queued are marked `Failed`.
    pub fn request(&self, folder: &FolderRef, files: Vec<FileStat>) -> Result<(), HashError> {
        let Some(first) = files.first() else {
            return Ok(());
        };
        let first_path = folder.path().join(&first.name);
        let device = device_of(&first_path)
            .or_else(|_| device_of(folder.path()))
            .map_err(|e| HashError::from_io(folder.path(), e))?;

        for file in &files {
            folder.mark_pending(&file.name, file.size, file.mtime);
        }

        let mut lanes = self.lanes();
        if !lanes.contains_key(&device) {
            match self.spawn_lane(device) {
                Ok(lane) => {
                    lanes.insert(device, lane);
                }
                Err(e) => {
                    drop(lanes);
                    let reason = e.to_string();
                    for file in &files {
                        folder.set_hash(&file.name, failed(file, reason.clone()));
                    }
                    return Err(HashError::from_io(folder.path(), e));
                }
            }
        }
        let Some(lane) = lanes.get(&device) else {
            return Ok(());
        };

        log::debug!(
            "Queued {} files of {} on device {}",
            files.len(),
            folder.path().display(),
            device
        );
        let mut files = files.into_iter();
        while let Some(file) = files.next() {
            let job = Job::Hash {
                folder: Arc::clone(folder),
                file,
            };
            if let Err(crossbeam_channel::SendError(job)) = lane.sender.send(job) {
                // Worker is gone; nothing behind this point will be hashed
                let reason = format!("hash worker for device {} stopped", device);
                let unsent = std::iter::once(job).filter_map(|j| match j {
                    Job::Hash { file, .. } => Some(file),
                    Job::Stop => None,
                });
                for file in unsent.chain(files.by_ref()) {
                    folder.set_hash(&file.name, failed(&file, reason.clone()));
                }
                return Err(HashError::Io {
                    path: folder.path().to_path_buf(),
                    source: io::Error::other(reason),
                });
            }
        }
        Ok(())
    }

    fn spawn_lane(&self, device: u64) -> io::Result<Lane> {
        let (sender, receiver) = unbounded();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("hash-dev-{}", device))
            .spawn(move || run_worker(&receiver, &shared))?;
        log::debug!("Started hash worker for device {}", device);
        Ok(Lane { sender, handle })
    }

    /// Stop every worker after its queued work is done, and wait for it.
    ///
    /// The pool can be used again afterwards; workers are recreated on demand.
    pub fn terminate(&self) {
        let lanes: Vec<(u64, Lane)> = self.lanes().drain().collect();
        if lanes.is_empty() {
            return;
        }

        for (_, lane) in &lanes {
            let _ = lane.sender.send(Job::Stop);
        }
        while lanes
            .iter()
            .any(|(_, lane)| !lane.sender.is_empty() && !lane.handle.is_finished())
        {
            thread::sleep(TERMINATE_POLL);
        }

        for (device, lane) in lanes {
            drop(lane.sender);
            if lane.handle.join().is_err() {
                log::error!("Hash worker for device {} panicked", device);
            }
        }
        log::debug!("Hash workers terminated: {:?}", self.stats());
    }
}

impl Drop for HashWorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn computed(file: &FileStat, hash: String) -> FileHash {
    FileHash {
        size: file.size,
        mtime: file.mtime,
        state: HashState::Computed(hash),
    }
}

fn failed(file: &FileStat, reason: String) -> FileHash {
    FileHash {
        size: file.size,
        mtime: file.mtime,
        state: HashState::Failed(reason),
    }
}

fn run_worker(receiver: &Receiver<Job>, shared: &Shared) {
    for job in receiver.iter() {
        match job {
            Job::Stop => break,
            Job::Hash { folder, file } => hash_one(shared, &folder, &file),
        }
    }
}

fn hash_one(shared: &Shared, folder: &FolderRef, file: &FileStat) {
    let path: PathBuf = folder.path().join(&file.name);
    let observer = shared.hasher.observer();

    if let Some(hash) = shared.cache.lookup(&path, file.size, file.mtime) {
        shared.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        folder.set_hash(&file.name, computed(file, hash));
        if let Some(observer) = observer {
            observer.on_file_hashed(&path, true);
        }
        return;
    }

    match shared.hasher.hash_file(&path) {
        Ok(hash) => {
            shared.counters.files_hashed.fetch_add(1, Ordering::Relaxed);
            shared
                .counters
                .bytes_hashed
                .fetch_add(file.size, Ordering::Relaxed);

            let entry = CacheEntry {
                path: path.clone(),
                size: file.size,
                mtime: file.mtime,
                hash: hash.clone(),
            };
            if let Err(e) = shared.cache.insert(entry) {
                log::warn!("Failed to persist hash for {}: {}", path.display(), e);
            }
            folder.set_hash(&file.name, computed(file, hash));
            if let Some(observer) = observer {
                observer.on_file_hashed(&path, false);
            }
        }
        Err(e) => {
            log::warn!("Failed to hash {}: {}", path.display(), e);
            shared.counters.failures.fetch_add(1, Ordering::Relaxed);
            folder.set_hash(&file.name, failed(file, e.to_string()));
        }
    }
}
