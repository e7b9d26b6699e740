//! Pairing files of two folders by content hash.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::{OsStr, OsString};

use crate::scanner::{FolderRecord, HashState};

/// Summary of a folder comparison, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyState {
    /// Neither folder has any hash entry.
    NotRequested,
    /// Some hashes are still being computed.
    Pending,
    /// Every hashed file has an identical partner.
    Verified,
    /// Some files match, some do not.
    Partial,
    /// No file matches.
    Mismatched,
    /// At least one file could not be hashed.
    Failed,
}

/// Files of `keep` and `other` paired by hash.
///
/// Names are raw file names relative to each folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderComparison {
    /// `(keep name, other name)` pairs with identical content.
    pub matched: Vec<(OsString, OsString)>,
    /// Hashed files of `keep` with no partner.
    pub unmatched_keep: Vec<OsString>,
    /// Hashed files of `other` with no partner.
    pub unmatched_other: Vec<OsString>,
    /// Entries still pending, both sides.
    pub pending: usize,
    /// Entries that failed, both sides.
    pub failed: usize,
    /// Total hash entries, both sides.
    pub requested: usize,
}

impl FolderComparison {
    /// Overall state of the comparison.
    #[must_use]
    pub fn state(&self) -> VerifyState {
        if self.requested == 0 {
            VerifyState::NotRequested
        } else if self.pending > 0 {
            VerifyState::Pending
        } else if self.failed > 0 {
            VerifyState::Failed
        } else if self.matched.is_empty() {
            VerifyState::Mismatched
        } else if self.unmatched_keep.is_empty() && self.unmatched_other.is_empty() {
            VerifyState::Verified
        } else {
            VerifyState::Partial
        }
    }
}

/// Computed hashes of a folder, sorted by file name.
fn computed(folder: &FolderRecord, cmp: &mut FolderComparison) -> BTreeMap<OsString, String> {
    let mut hashes = BTreeMap::new();
    for (name, entry) in folder.hashes() {
        cmp.requested += 1;
        match entry.state {
            HashState::Pending => cmp.pending += 1,
            HashState::Failed(_) => cmp.failed += 1,
            HashState::Computed(hash) => {
                hashes.insert(name, hash);
            }
        }
    }
    hashes
}

/// Pair the computed files of `keep` with those of `other`.
///
/// Each file pairs at most once. Names are visited in sorted order, so equal
/// content on either side pairs deterministically.
#[must_use]
pub fn compare_folders(keep: &FolderRecord, other: &FolderRecord) -> FolderComparison {
    let mut cmp = FolderComparison::default();
    let keep_hashes = computed(keep, &mut cmp);
    let other_hashes = computed(other, &mut cmp);

    let mut by_hash: HashMap<&str, VecDeque<&OsStr>> = HashMap::new();
    for (name, hash) in &other_hashes {
        by_hash.entry(hash.as_str()).or_default().push_back(name.as_os_str());
    }

    for (name, hash) in &keep_hashes {
        match by_hash.get_mut(hash.as_str()).and_then(VecDeque::pop_front) {
            Some(partner) => cmp.matched.push((name.clone(), partner.to_os_string())),
            None => cmp.unmatched_keep.push(name.clone()),
        }
    }

    let mut leftover: Vec<OsString> = by_hash
        .into_values()
        .flatten()
        .map(OsStr::to_os_string)
        .collect();
    leftover.sort();
    cmp.unmatched_other = leftover;
    cmp
}
