//! Cache entry definitions.

use std::path::PathBuf;

use crate::scanner::Mtime;
use crate::snapshot::codec::{encodable_path, path_from_bytes};

/// A cached hash for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size when hashed.
    pub size: u64,
    /// Modification time when hashed.
    pub mtime: Mtime,
    /// Base64 digest without padding.
    pub hash: String,
}

impl CacheEntry {
    /// Whether the entry still describes a file with this size and mtime.
    #[must_use]
    pub fn matches(&self, size: u64, mtime: Mtime) -> bool {
        self.size == size && self.mtime == mtime
    }

    /// Serialize as one log line, `<size> <mtime> <hash> <path>\n`.
    ///
    /// Returns `None` if the path contains a newline.
    #[must_use]
    pub fn to_line(&self) -> Option<Vec<u8>> {
        let path = encodable_path(&self.path)?;
        let mut line = format!("{} {} {} ", self.size, self.mtime, self.hash).into_bytes();
        line.extend_from_slice(&path);
        line.push(b'\n');
        Some(line)
    }

    /// Parse one log line without its terminator.
    #[must_use]
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        let mut fields = line.splitn(4, |&b| b == b' ');
        let size = std::str::from_utf8(fields.next()?).ok()?.parse().ok()?;
        let mtime = std::str::from_utf8(fields.next()?).ok()?.parse().ok()?;
        let hash = std::str::from_utf8(fields.next()?).ok()?;
        let path = fields.next()?;
        if hash.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self {
            path: path_from_bytes(path)?,
            size,
            mtime,
            hash: hash.to_string(),
        })
    }
}
