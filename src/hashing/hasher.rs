//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] reads a file in fixed-size chunks and feeds them to BLAKE3, so
//! memory use is bounded by the chunk size regardless of the file size. The
//! digest is returned base64-encoded without padding, the form stored in the
//! hash log.
//!
//! Progress is reported every `progress_interval` bytes rather than on a
//! timer, which bounds notification frequency independently of disk speed.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

use super::HashError;
use crate::progress::HashObserver;
use crate::scanner::MIB;

/// Default read size per chunk (512 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Default number of bytes between progress reports (16 MiB).
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 16 * MIB;

/// Encode a raw digest the way the hash log stores it.
#[must_use]
pub fn encode_digest(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Streaming file hasher.
#[derive(Clone)]
pub struct Hasher {
    chunk_size: usize,
    progress_interval: u64,
    observer: Option<Arc<dyn HashObserver>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("chunk_size", &self.chunk_size)
            .field("progress_interval", &self.progress_interval)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            observer: None,
        }
    }

    /// Set the read size per chunk. Zero is treated as one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the byte interval between progress reports. Zero disables reporting.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Attach a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn HashObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The attached observer, if any.
    #[must_use]
    pub fn observer(&self) -> Option<&Arc<dyn HashObserver>> {
        self.observer.as_ref()
    }

    /// Hash a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn hash_file(&self, path: &Path) -> Result<String, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let total = file.metadata().map(|m| m.len()).unwrap_or(0);

        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut done: u64 = 0;
        let mut next_report = self.progress_interval;
        let mut last_report = (Instant::now(), 0u64);

        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buf[..n]);
            done += n as u64;

            if self.progress_interval > 0 && done >= next_report {
                next_report = done - done % self.progress_interval + self.progress_interval;
                if let Some(observer) = &self.observer {
                    let elapsed = last_report.0.elapsed().as_secs_f64();
                    let rate = if elapsed > 0.0 {
                        (done - last_report.1) as f64 / elapsed
                    } else {
                        0.0
                    };
                    let percent = if total > 0 {
                        (done as f64 / total as f64 * 100.0).min(100.0)
                    } else {
                        100.0
                    };
                    observer.on_hash_progress(path, percent, rate);
                    last_report = (Instant::now(), done);
                }
            }
        }

        log::trace!("Hashed {} ({} bytes)", path.display(), done);
        Ok(encode_digest(hasher.finalize().as_bytes()))
    }
}
