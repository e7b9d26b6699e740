//! Replacing duplicate files with symlinks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{require_regular_file, ActionError};

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Temporary sibling name for a link being created.
fn staging_path(nuke: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(nuke.file_name().unwrap_or_default());
    name.push(".foldupe-link");
    nuke.with_file_name(name)
}

/// Replace each `nuke_dir/nuke_names[i]` with a symlink to `keep_dir/kept_names[i]`.
///
/// All files are validated first: both lists must have the same length, every
/// path on both sides must be a regular file, no file may be paired with
/// itself, and the temporary `.<name>.foldupe-link` sibling must not exist.
/// Each replacement creates the symlink under that temporary name and renames
/// it over the original, so a file is never missing.
///
/// Returns the replaced paths.
///
/// # Errors
///
/// [`ActionError::PairingMismatch`], [`ActionError::DestinationExists`] for an
/// occupied temporary name, or another validation error before anything is
/// changed; [`ActionError::Io`] if a replacement fails part way.
pub fn replace_with_symlinks<N: AsRef<Path>>(
    keep_dir: &Path,
    kept_names: &[N],
    nuke_dir: &Path,
    nuke_names: &[N],
) -> Result<Vec<PathBuf>, ActionError> {
    if kept_names.len() != nuke_names.len() {
        return Err(ActionError::PairingMismatch(format!(
            "{} kept files for {} replacements",
            kept_names.len(),
            nuke_names.len()
        )));
    }

    let pairs: Vec<(PathBuf, PathBuf)> = kept_names
        .iter()
        .zip(nuke_names)
        .map(|(k, n)| (keep_dir.join(k), nuke_dir.join(n)))
        .collect();

    for (keep, nuke) in &pairs {
        require_regular_file(keep)?;
        require_regular_file(nuke)?;
        if keep == nuke {
            return Err(ActionError::PairingMismatch(format!(
                "{} paired with itself",
                keep.display()
            )));
        }
        let staging = staging_path(nuke);
        if fs::symlink_metadata(&staging).is_ok() {
            return Err(ActionError::DestinationExists(staging));
        }
    }

    let mut replaced = Vec::with_capacity(pairs.len());
    for (keep, nuke) in pairs {
        let staging = staging_path(&nuke);
        make_symlink(&keep, &staging).map_err(|e| ActionError::from_io(&staging, e))?;
        if let Err(e) = fs::rename(&staging, &nuke) {
            let _ = fs::remove_file(&staging);
            return Err(ActionError::from_io(&nuke, e));
        }
        log::info!("Linked {} -> {}", nuke.display(), keep.display());
        replaced.push(nuke);
    }
    Ok(replaced)
}
