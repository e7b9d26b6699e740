//! Pruning candidates whose folders no longer exist.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::DupeCandidate;
use crate::scanner::FolderRecord;

/// Result of [`prune_stale`].
#[derive(Debug, Default)]
pub struct StaleReport {
    /// Surviving candidates, in their original order.
    pub kept: Vec<DupeCandidate>,
    /// Paths of folders that are gone, in first-seen order.
    pub stale_folders: Vec<PathBuf>,
}

impl StaleReport {
    /// Whether anything was dropped.
    #[must_use]
    pub fn is_shrunk(&self) -> bool {
        !self.stale_folders.is_empty()
    }
}

/// Drop every candidate that references a folder which is no longer a directory.
///
/// Each folder instance is checked once, however many candidates share it.
#[must_use]
pub fn prune_stale(dupes: Vec<DupeCandidate>) -> StaleReport {
    let mut alive: HashMap<*const FolderRecord, bool> = HashMap::new();
    let mut report = StaleReport::default();

    for dupe in dupes {
        let mut keep = true;
        for folder in dupe.folders() {
            let exists = *alive.entry(Arc::as_ptr(folder)).or_insert_with(|| {
                let exists = folder.path().is_dir();
                if !exists {
                    log::warn!("Folder vanished: {}", folder.path().display());
                    report.stale_folders.push(folder.path().to_path_buf());
                }
                exists
            });
            keep &= exists;
        }
        if keep {
            report.kept.push(dupe);
        }
    }
    report
}
