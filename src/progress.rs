//! Progress reporting interfaces and an indicatif-backed implementation.
//!
//! The core never prints. The scanner reports the directory being read
//! through [`ScanObserver`] and the hashing pool reports per-file progress
//! through [`HashObserver`]. [`Progress`] implements both for the CLI.
//!
//! # Rate limiting
//!
//! Neither interface is called at high frequency: the scanner emits at most
//! once per configured interval (and only when the directory changed), the
//! hasher once per fixed byte-count interval of a large file.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Receives directory-walk notifications.
pub trait ScanObserver: Send + Sync {
    /// Called with the directory currently being read.
    fn on_directory(&self, path: &Path);

    /// Called when an entry on a different device is skipped.
    fn on_mountpoint_skipped(&self, _path: &Path) {}
}

/// Receives hashing notifications.
pub trait HashObserver: Send + Sync {
    /// Called periodically while hashing a large file.
    ///
    /// # Arguments
    ///
    /// * `path` - File being hashed
    /// * `percent` - Completion in the range 0..=100
    /// * `bytes_per_sec` - Throughput since the previous report
    fn on_hash_progress(&self, path: &Path, percent: f64, bytes_per_sec: f64);

    /// Called once a file's hash is known, whether read from cache or computed.
    fn on_file_hashed(&self, _path: &Path, _from_cache: bool) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ScanObserver for Silent {
    fn on_directory(&self, _path: &Path) {}
}

impl HashObserver for Silent {
    fn on_hash_progress(&self, _path: &Path, _percent: f64, _bytes_per_sec: f64) {}
}

/// Progress reporter using indicatif.
///
/// One spinner follows the directory walk, another the hashing pool.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    hashing: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            hashing: Mutex::new(None),
            quiet,
        }
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Start the walk spinner.
    pub fn start_walk(&self) {
        if self.quiet {
            return;
        }
        let pb = self.spinner("Reading directories");
        *self.walking.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    /// Stop the walk spinner.
    pub fn finish_walk(&self, folders: usize) {
        if let Some(pb) = self
            .walking
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_with_message(format!("Walk complete, {} qualifying folders", folders));
        }
    }

    /// Start the hashing spinner.
    pub fn start_hashing(&self) {
        if self.quiet {
            return;
        }
        let pb = self.spinner("Hashing");
        *self.hashing.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    /// Stop the hashing spinner.
    pub fn finish_hashing(&self) {
        if let Some(pb) = self
            .hashing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_with_message("Hashing complete");
        }
    }
}

impl ScanObserver for Progress {
    fn on_directory(&self, path: &Path) {
        if let Some(pb) = &*self.walking.lock().unwrap_or_else(PoisonError::into_inner) {
            pb.set_message(format!("reading {}", truncate_path(&path.to_string_lossy(), 60)));
        }
    }

    fn on_mountpoint_skipped(&self, path: &Path) {
        if let Some(pb) = &*self.walking.lock().unwrap_or_else(PoisonError::into_inner) {
            pb.println(format!("skipping mountpoint {}", path.display()));
        }
    }
}

impl HashObserver for Progress {
    fn on_hash_progress(&self, path: &Path, percent: f64, bytes_per_sec: f64) {
        if let Some(pb) = &*self.hashing.lock().unwrap_or_else(PoisonError::into_inner) {
            pb.set_message(format!(
                "{:5.1}% {}/s {}",
                percent,
                ByteSize(bytes_per_sec as u64),
                truncate_path(&path.to_string_lossy(), 40)
            ));
        }
    }

    fn on_file_hashed(&self, path: &Path, from_cache: bool) {
        if let Some(pb) = &*self.hashing.lock().unwrap_or_else(PoisonError::into_inner) {
            let source = if from_cache { "cached" } else { "hashed" };
            pb.set_message(format!("{} {}", source, truncate_path(&path.to_string_lossy(), 40)));
        }
    }
}

/// Truncate a path for display in a progress line.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.len() >= max_len {
        let mut start = file_name.len() - max_len + 3;
        while !file_name.is_char_boundary(start) {
            start += 1;
        }
        return format!("...{}", &file_name[start..]);
    }

    format!(".../{}", file_name)
}
