//! Device identification for mount-bounded walks and per-device hashing.
//!
//! - **Unix**: `st_dev` from the file metadata
//! - **Other**: every path reports device 0 (one device, one hashing queue)

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// Device id of the filesystem holding an entry.
#[must_use]
pub fn device_id(metadata: &Metadata) -> u64 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        metadata.dev()
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        0
    }
}

/// Device id of a path, without following a final symlink.
pub fn device_of(path: &Path) -> io::Result<u64> {
    fs::symlink_metadata(path).map(|m| device_id(&m))
}
