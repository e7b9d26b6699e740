//! Single-level folder listings.
//!
//! Used by the side-by-side comparison view and by the tree builder's lazy
//! loading. Entries come back sorted by name and symlinks are reported as
//! such, never resolved.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use serde::Serializer;
use walkdir::WalkDir;

use super::folder::{mtime_of, Mtime};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// One direct entry of a folder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ListingEntry {
    pub kind: EntryKind,
    /// Size in bytes (regular files only, otherwise 0).
    pub size: u64,
    /// Modification time (regular files only, otherwise 0).
    pub mtime: Mtime,
    /// Raw file name; only rendering goes through lossy text.
    #[serde(serialize_with = "serialize_lossy")]
    pub name: OsString,
}

impl ListingEntry {
    /// Whether this is a regular file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Name for display.
    #[must_use]
    pub fn display_name(&self) -> Cow<'_, str> {
        self.name.to_string_lossy()
    }
}

/// Serialize a file name as (lossy) text.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize_lossy<N, S>(name: &N, serializer: S) -> Result<S::Ok, S::Error>
where
    N: AsRef<OsStr> + ?Sized,
    S: Serializer,
{
    serializer.serialize_str(&name.as_ref().to_string_lossy())
}

/// List the direct entries of a folder, sorted by name.
///
/// # Errors
///
/// Fails if the folder itself cannot be read. Entries that vanish or cannot
/// be stated mid-listing are skipped with a warning.
pub fn list_folder(path: &Path) -> io::Result<Vec<ListingEntry>> {
    // Surface a missing or unreadable root as an error rather than an empty list
    std::fs::read_dir(path)?;

    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Skipping entry in {}: {}", path.display(), e);
                continue;
            }
        };
        let name = entry.file_name().to_os_string();
        let file_type = entry.file_type();

        let entry = if file_type.is_symlink() {
            ListingEntry { kind: EntryKind::Symlink, size: 0, mtime: 0, name }
        } else if file_type.is_dir() {
            ListingEntry { kind: EntryKind::Dir, size: 0, mtime: 0, name }
        } else if file_type.is_file() {
            match entry.metadata() {
                Ok(m) => ListingEntry {
                    kind: EntryKind::File,
                    size: m.len(),
                    mtime: mtime_of(&m),
                    name,
                },
                Err(e) => {
                    log::warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            }
        } else {
            ListingEntry { kind: EntryKind::Other, size: 0, mtime: 0, name }
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Flags, per entry of `left`, whether its size is matched in `right`.
///
/// Each size in `right` can match at most once, the same consumption rule the
/// scorer uses. Non-file entries are never matched.
#[must_use]
pub fn matching_sizes(left: &[ListingEntry], right: &[ListingEntry]) -> Vec<bool> {
    let mut available: HashMap<u64, usize> = HashMap::new();
    for entry in right.iter().filter(|e| e.is_file()) {
        *available.entry(entry.size).or_default() += 1;
    }

    left.iter()
        .map(|entry| {
            if !entry.is_file() {
                return false;
            }
            match available.get_mut(&entry.size) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    true
                }
                _ => false,
            }
        })
        .collect()
}
