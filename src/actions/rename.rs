//! Renaming files to match their verified twins.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::ActionError;

fn exists_no_follow(path: &Path) -> Result<bool, ActionError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ActionError::from_io(path, e)),
    }
}

/// Rename each `(old, new)` pair, refusing to overwrite anything.
///
/// All pairs are validated before the first rename: every source must exist,
/// no destination may exist (a dangling symlink counts), and no two pairs may
/// share a destination. Pairs with `old == new` are skipped. Returns the
/// number of files renamed.
///
/// # Errors
///
/// [`ActionError::DestinationExists`] or [`ActionError::NotFound`] before
/// anything is renamed; [`ActionError::Io`] if a rename fails part way.
pub fn rename_to_match(pairs: &[(PathBuf, PathBuf)]) -> Result<usize, ActionError> {
    let pending: Vec<&(PathBuf, PathBuf)> = pairs.iter().filter(|(old, new)| old != new).collect();

    let mut targets = HashSet::new();
    for (old, new) in &pending {
        if !exists_no_follow(old)? {
            return Err(ActionError::NotFound(old.clone()));
        }
        if exists_no_follow(new)? || !targets.insert(new) {
            return Err(ActionError::DestinationExists(new.clone()));
        }
    }

    for (old, new) in &pending {
        // Something may have appeared since validation
        if exists_no_follow(new)? {
            return Err(ActionError::DestinationExists(new.clone()));
        }
        fs::rename(old, new).map_err(|e| ActionError::from_io(old, e))?;
        log::info!("Renamed {} -> {}", old.display(), new.display());
    }
    Ok(pending.len())
}
