//! JSON output for scripting.
//!
//! Everything is plain data: scores as fractions and permille, sizes in
//! bytes, paths as strings.
//!
//! # Scan schema
//!
//! ```json
//! {
//!   "candidates": [
//!     {
//!       "index": 0,
//!       "score": 0.6666,
//!       "permille": 666,
//!       "a": { "path": "/mnt/d01/show", "files": 3, "bytes": 6291456 },
//!       "b": { "path": "/mnt/d02/show", "files": 3, "bytes": 7340032 },
//!       "hits": 2,
//!       "hit_bytes": 3145728
//!     }
//!   ],
//!   "summary": {
//!     "folders": 2,
//!     "candidates": 1,
//!     "errors": [],
//!     "skipped_mounts": [],
//!     "stale_folders": [],
//!     "exit_code": 0,
//!     "exit_code_name": "FD000"
//!   }
//! }
//! ```

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::duplicates::DupeCandidate;
use crate::error::ExitCode;
use crate::hashing::{FolderComparison, VerifyState};
use crate::scanner::listing::matching_sizes;
use crate::scanner::{FolderRecord, ListingEntry};

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn name_string(name: &OsStr) -> String {
    name.to_string_lossy().into_owned()
}

/// One side of a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFolder {
    pub path: String,
    pub files: usize,
    pub bytes: u64,
}

impl JsonFolder {
    #[must_use]
    pub fn from_record(folder: &FolderRecord) -> Self {
        Self {
            path: path_string(folder.path()),
            files: folder.file_count(),
            bytes: folder.total_size(),
        }
    }
}

/// One scored pair.
#[derive(Debug, Clone, Serialize)]
pub struct JsonCandidate {
    /// Position in the dupe set, as accepted by `verify`, `compare` and `collapse`
    pub index: usize,
    pub score: f64,
    pub permille: u32,
    pub a: JsonFolder,
    pub b: JsonFolder,
    pub hits: usize,
    pub hit_bytes: u64,
}

impl JsonCandidate {
    #[must_use]
    pub fn new(index: usize, dupe: &DupeCandidate) -> Self {
        let overlap = dupe.overlap();
        Self {
            index,
            score: dupe.score,
            permille: dupe.permille(),
            a: JsonFolder::from_record(&dupe.a),
            b: JsonFolder::from_record(&dupe.b),
            hits: overlap.hits,
            hit_bytes: overlap.hit_bytes,
        }
    }
}

/// Totals for a scan run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JsonScanSummary {
    /// Qualifying folders considered by the scorer
    pub folders: usize,
    pub candidates: usize,
    /// Non-fatal access errors from the walk
    pub errors: Vec<String>,
    pub skipped_mounts: Vec<String>,
    /// Candidate folders that vanished since the scan
    pub stale_folders: Vec<String>,
    pub exit_code: i32,
    pub exit_code_name: String,
}

impl JsonScanSummary {
    #[must_use]
    pub fn with_exit_code(mut self, code: ExitCode) -> Self {
        self.exit_code = code.as_i32();
        self.exit_code_name = code.code_prefix().to_string();
        self
    }
}

/// Complete output of `scan`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonScanOutput {
    pub candidates: Vec<JsonCandidate>,
    pub summary: JsonScanSummary,
}

impl JsonScanOutput {
    #[must_use]
    pub fn new(dupes: &[DupeCandidate], mut summary: JsonScanSummary) -> Self {
        summary.candidates = dupes.len();
        Self {
            candidates: dupes
                .iter()
                .enumerate()
                .map(|(i, d)| JsonCandidate::new(i, d))
                .collect(),
            summary,
        }
    }
}

/// Result of verifying one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct JsonComparison {
    pub index: usize,
    pub keep: String,
    pub other: String,
    pub state: VerifyState,
    /// `[keep name, other name]` pairs with identical content
    pub matched: Vec<(String, String)>,
    pub unmatched_keep: Vec<String>,
    pub unmatched_other: Vec<String>,
    pub pending: usize,
    pub failed: usize,
    pub requested: usize,
}

impl JsonComparison {
    #[must_use]
    pub fn new(index: usize, keep: &Path, other: &Path, cmp: &FolderComparison) -> Self {
        Self {
            index,
            keep: path_string(keep),
            other: path_string(other),
            state: cmp.state(),
            matched: cmp
                .matched
                .iter()
                .map(|(k, o)| (name_string(k), name_string(o)))
                .collect(),
            unmatched_keep: cmp.unmatched_keep.iter().map(|n| name_string(n)).collect(),
            unmatched_other: cmp.unmatched_other.iter().map(|n| name_string(n)).collect(),
            pending: cmp.pending,
            failed: cmp.failed,
            requested: cmp.requested,
        }
    }
}

/// A folder listing with per-entry size-match flags.
#[derive(Debug, Clone, Serialize)]
pub struct JsonListing {
    pub path: String,
    pub entries: Vec<ListingEntry>,
    /// Parallel to `entries`: whether the size is matched on the other side
    pub matched: Vec<bool>,
}

/// Output of `compare`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSideBySide {
    pub index: usize,
    /// Verification state from hashes cached by earlier runs
    pub state: VerifyState,
    pub a: JsonListing,
    pub b: JsonListing,
}

impl JsonSideBySide {
    #[must_use]
    pub fn new(
        index: usize,
        state: VerifyState,
        a_path: &Path,
        a: Vec<ListingEntry>,
        b_path: &Path,
        b: Vec<ListingEntry>,
    ) -> Self {
        let a_matched = matching_sizes(&a, &b);
        let b_matched = matching_sizes(&b, &a);
        Self {
            index,
            state,
            a: JsonListing {
                path: path_string(a_path),
                entries: a,
                matched: a_matched,
            },
            b: JsonListing {
                path: path_string(b_path),
                entries: b,
                matched: b_matched,
            },
        }
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

/// Write any view as one JSON document followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write + ?Sized, T: Serialize + ?Sized>(
    writer: &mut W,
    value: &T,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}
