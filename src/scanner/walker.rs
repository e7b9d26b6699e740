//! Device-bounded, post-order directory walker.
//!
//! # Overview
//!
//! [`DirectoryScanner`] walks a root depth-first and produces a
//! [`FolderRecord`] for every directory that passes
//! [`FolderRecord::qualifies`]. Subdirectories are finished before their
//! parent is evaluated, so a parent always follows its children in the
//! resulting list.
//!
//! # Rules
//!
//! - Symlinks are never followed and never counted.
//! - Entries on a different device than the root are reported as skipped
//!   mountpoints and not descended into.
//! - Listing or stat failures are collected in the [`ScanReport`] and the walk
//!   carries on with the siblings.
//! - Cancellation via the shutdown flag is the one error that escapes, from
//!   any depth, as [`ScanError::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use foldupe::scanner::DirectoryScanner;
//! use std::path::PathBuf;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let shutdown = Arc::new(AtomicBool::new(false));
//! let scanner = DirectoryScanner::new().with_shutdown_flag(shutdown);
//! let roots = vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")];
//! let report = scanner.scan_all(&roots).expect("interrupted");
//! println!("{} folders", report.folders.len());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::device::device_id;
use super::{FolderRecord, ScanError, ScanReport};
use crate::progress::ScanObserver;

/// Default interval between progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Recursive folder scanner.
#[derive(Clone)]
pub struct DirectoryScanner {
    shutdown_flag: Option<Arc<AtomicBool>>,
    observer: Option<Arc<dyn ScanObserver>>,
    progress_interval: Duration,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("shutdown_flag", &self.shutdown_flag)
            .field("observer", &self.observer.is_some())
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

/// Mutable state threaded through one walk.
struct WalkState<'a> {
    root_device: u64,
    current: &'a Mutex<Option<PathBuf>>,
    report: ScanReport,
}

impl DirectoryScanner {
    /// Create a scanner with no shutdown flag and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shutdown_flag: None,
            observer: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag becomes `true` the walk unwinds and the scan returns
    /// [`ScanError::Cancelled`].
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Attach a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Set the minimum interval between directory notifications.
    ///
    /// A zero interval notifies every directory synchronously from the walk
    /// instead of from the background reporter.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn check_cancelled(&self) -> Result<(), ScanError> {
        if self.is_shutdown_requested() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Scan several roots in order and concatenate the results.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if the shutdown flag is raised.
    pub fn scan_all<P: AsRef<Path>>(&self, roots: &[P]) -> Result<ScanReport, ScanError> {
        let mut report = ScanReport::default();
        for root in roots {
            report.merge(self.scan(root.as_ref())?);
        }
        Ok(report)
    }

    /// Scan one root.
    ///
    /// A root that cannot be resolved or is not a directory yields an empty
    /// report carrying that error.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if the shutdown flag is raised.
    pub fn scan(&self, root: &Path) -> Result<ScanReport, ScanError> {
        let mut report = ScanReport::default();

        let root = match fs::canonicalize(root) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Cannot resolve scan root {}: {}", root.display(), e);
                report.errors.push(ScanError::from_io(root, e));
                return Ok(report);
            }
        };
        let metadata = match fs::metadata(&root) {
            Ok(m) => m,
            Err(e) => {
                report.errors.push(ScanError::from_io(&root, e));
                return Ok(report);
            }
        };
        if !metadata.is_dir() {
            report.errors.push(ScanError::NotADirectory(root));
            return Ok(report);
        }

        log::info!("Scanning {}", root.display());
        let current = Mutex::new(None);
        let done = AtomicBool::new(false);
        let mut state = WalkState {
            root_device: device_id(&metadata),
            current: &current,
            report,
        };

        let outcome = thread::scope(|s| {
            if let Some(observer) = self.observer.as_ref().filter(|_| !self.notifies_inline()) {
                let observer = Arc::clone(observer);
                let (current, done) = (&current, &done);
                let interval = self.progress_interval;
                s.spawn(move || report_progress(observer.as_ref(), current, done, interval));
            }
            let outcome = self.walk_dir(&root, &mut state);
            done.store(true, Ordering::Release);
            outcome
        });
        outcome?;

        log::debug!(
            "Scan of {} found {} qualifying folders ({} errors)",
            root.display(),
            state.report.folders.len(),
            state.report.errors.len()
        );
        Ok(state.report)
    }

    fn notifies_inline(&self) -> bool {
        self.progress_interval.is_zero()
    }

    fn walk_dir(&self, dir: &Path, state: &mut WalkState<'_>) -> Result<(), ScanError> {
        self.check_cancelled()?;
        *state.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(dir.to_path_buf());
        if let Some(observer) = self.observer.as_ref().filter(|_| self.notifies_inline()) {
            observer.on_directory(dir);
            self.check_cancelled()?;
        }

        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                log::warn!("Cannot list {}: {}", dir.display(), e);
                state.report.errors.push(ScanError::from_io(dir, e));
                return Ok(());
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            match entry {
                Ok(entry) => entries.push(entry.path()),
                Err(e) => {
                    log::warn!("Cannot read entry in {}: {}", dir.display(), e);
                    state.report.errors.push(ScanError::from_io(dir, e));
                }
            }
        }
        entries.sort();

        let mut files = Vec::new();
        for path in entries {
            self.check_cancelled()?;

            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Cannot stat {}: {}", path.display(), e);
                    state.report.errors.push(ScanError::from_io(&path, e));
                    continue;
                }
            };

            let file_type = metadata.file_type();
            if file_type.is_symlink() {
                continue;
            }
            if device_id(&metadata) != state.root_device {
                log::info!("Skipping mountpoint {}", path.display());
                if let Some(observer) = &self.observer {
                    observer.on_mountpoint_skipped(&path);
                }
                state.report.skipped_mounts.push(path);
                continue;
            }

            if file_type.is_dir() {
                self.walk_dir(&path, state)?;
            } else if file_type.is_file() && metadata.len() > 0 {
                files.push(metadata.len());
            }
        }

        if FolderRecord::qualifies(&files) {
            log::trace!("Qualifying folder {} ({} files)", dir.display(), files.len());
            state.report.folders.push(FolderRecord::shared(dir, files));
        }
        Ok(())
    }
}

/// Suppresses repeated notifications for the same directory.
#[derive(Debug, Default)]
pub(crate) struct ProgressTicker {
    last: Option<PathBuf>,
}

impl ProgressTicker {
    /// Returns the directory to announce, if it changed since the last call.
    pub(crate) fn poll(&mut self, current: Option<&Path>) -> Option<PathBuf> {
        let current = current?;
        if self.last.as_deref() == Some(current) {
            return None;
        }
        self.last = Some(current.to_path_buf());
        self.last.clone()
    }
}

fn report_progress(
    observer: &dyn ScanObserver,
    current: &Mutex<Option<PathBuf>>,
    done: &AtomicBool,
    interval: Duration,
) {
    let mut ticker = ProgressTicker::default();
    while !done.load(Ordering::Acquire) {
        thread::sleep(interval);
        let snapshot = current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(dir) = ticker.poll(snapshot.as_deref()) {
            observer.on_directory(&dir);
        }
    }
}
