//! Copying modification times between verified twins.

use std::path::PathBuf;

use filetime::FileTime;

use super::{require_regular_file, ActionError};

/// Set each destination's modification time to its source's.
///
/// Every source and destination is checked before any time is changed.
/// Returns the number of files updated.
///
/// # Errors
///
/// A validation error if any path is missing or not a regular file, or
/// [`ActionError::Io`] if setting a time fails.
pub fn sync_mtimes(pairs: &[(PathBuf, PathBuf)]) -> Result<usize, ActionError> {
    let mut times = Vec::with_capacity(pairs.len());
    for (source, destination) in pairs {
        let metadata = require_regular_file(source)?;
        require_regular_file(destination)?;
        times.push(FileTime::from_last_modification_time(&metadata));
    }

    for ((source, destination), time) in pairs.iter().zip(times) {
        filetime::set_file_mtime(destination, time)
            .map_err(|e| ActionError::from_io(destination, e))?;
        log::debug!(
            "Synced mtime {} -> {}",
            source.display(),
            destination.display()
        );
    }
    log::info!("Synced modification times of {} file(s)", pairs.len());
    Ok(pairs.len())
}
