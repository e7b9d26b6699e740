//! On-disk location and compression of the persisted stages.
//!
//! A [`SnapshotStore`] owns one cache directory holding three independent
//! files. Deleting any one of them forces just that stage to be regenerated:
//!
//! | File          | Stage                         |
//! |---------------|-------------------------------|
//! | `scan.zst`    | raw scan (folder records)     |
//! | `dupes.zst`   | scored dupe candidates        |
//! | `hashes.log`  | durable hash cache            |

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::codec::{self, Decoded};
use super::SnapshotError;
use crate::duplicates::DupeCandidate;
use crate::scanner::FolderRef;

/// File name of the raw scan snapshot.
pub const SNAPSHOT_FILE: &str = "scan.zst";
/// File name of the dupe set.
pub const DUPESET_FILE: &str = "dupes.zst";
/// File name of the hash log.
pub const HASH_LOG_FILE: &str = "hashes.log";

const COMPRESSION_LEVEL: i32 = 3;

/// Persistence for scans and dupe sets.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    #[must_use]
    pub fn dupeset_path(&self) -> PathBuf {
        self.dir.join(DUPESET_FILE)
    }

    #[must_use]
    pub fn hash_log_path(&self) -> PathBuf {
        self.dir.join(HASH_LOG_FILE)
    }

    /// Persist a raw scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_snapshot(&self, folders: &[FolderRef]) -> Result<(), SnapshotError> {
        let path = self.snapshot_path();
        let written = write_atomic(&path, |w| codec::write_folders(w, folders))?;
        log::info!("Saved {} folders to {}", written, path.display());
        Ok(())
    }

    /// Load the raw scan, or `None` if it has not been saved.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] if the file is malformed.
    pub fn load_snapshot(&self) -> Result<Option<Vec<FolderRef>>, SnapshotError> {
        Ok(read_compressed(&self.snapshot_path())?.map(|d| d.folders))
    }

    /// Persist a dupe set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_dupeset(&self, dupes: &[DupeCandidate]) -> Result<(), SnapshotError> {
        let path = self.dupeset_path();
        let written = write_atomic(&path, |w| codec::write_dupes(w, dupes))?;
        log::info!("Saved {} candidates to {}", written, path.display());
        Ok(())
    }

    /// Load the dupe set, or `None` if it has not been saved.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] if the file is malformed.
    pub fn load_dupeset(&self) -> Result<Option<Vec<DupeCandidate>>, SnapshotError> {
        Ok(read_compressed(&self.dupeset_path())?.map(|d| d.dupes))
    }

    /// Load the raw scan, deleting the file and returning `None` if corrupt.
    pub fn load_snapshot_or_discard(&self) -> Option<Vec<FolderRef>> {
        discard_on_corrupt(&self.snapshot_path(), self.load_snapshot())
    }

    /// Load the dupe set, deleting the file and returning `None` if corrupt.
    pub fn load_dupeset_or_discard(&self) -> Option<Vec<DupeCandidate>> {
        discard_on_corrupt(&self.dupeset_path(), self.load_dupeset())
    }

    /// Remove the dupe set only, so the next run rescores from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear_dupeset(&self) -> io::Result<bool> {
        remove_if_exists(&self.dupeset_path())
    }

    /// Remove all three persisted files. Returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be removed.
    pub fn clear_all(&self) -> io::Result<usize> {
        let mut removed = 0;
        for path in [self.snapshot_path(), self.dupeset_path(), self.hash_log_path()] {
            if remove_if_exists(&path)? {
                log::debug!("Removed {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn discard_on_corrupt<T>(path: &Path, result: Result<Option<T>, SnapshotError>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Discarding {}: {}", path.display(), e);
            if e.is_corrupt() {
                if let Err(rm) = remove_if_exists(path) {
                    log::warn!("Failed to remove {}: {}", path.display(), rm);
                }
            }
            None
        }
    }
}

/// Write through zstd into a temp file, then rename over `path`.
fn write_atomic<T>(
    path: &Path,
    write: impl FnOnce(&mut zstd::Encoder<'static, BufWriter<File>>) -> io::Result<T>,
) -> Result<T, SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result: io::Result<T> = (|| {
        let file = File::create(&tmp)?;
        let mut encoder = zstd::Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)?;
        let value = write(&mut encoder)?;
        let mut inner = encoder.finish()?;
        inner.flush()?;
        inner.get_ref().sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(value)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result.map_err(SnapshotError::Io)
}

/// Open and decode a compressed stream. Absent files are `Ok(None)`.
fn read_compressed(path: &Path) -> Result<Option<Decoded>, SnapshotError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let decoder = zstd::Decoder::new(file)?;

    // Read failures past this point are decompression failures
    codec::read_stream(BufReader::new(decoder))
        .map(Some)
        .map_err(|e| match e {
            SnapshotError::Io(err) => SnapshotError::Corrupt {
                line: 0,
                reason: format!("decompression failed: {}", err),
            },
            other => other,
        })
}
