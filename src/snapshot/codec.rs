//! Line codec for folder and dupe records.
//!
//! The codec works on plain `Write`/`BufRead` streams; compression and file
//! placement live in [`super::store`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::SnapshotError;
use crate::duplicates::DupeCandidate;
use crate::scanner::{FolderRecord, FolderRef};

const END_MARKER: &[u8] = b"eof";

/// Folders and dupes decoded from one stream.
#[derive(Debug, Default)]
pub struct Decoded {
    pub folders: Vec<FolderRef>,
    pub dupes: Vec<DupeCandidate>,
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    std::str::from_utf8(bytes).ok().map(PathBuf::from)
}

/// Encoded path, or `None` if it cannot be represented on one line.
pub(crate) fn encodable_path(path: &Path) -> Option<Cow<'_, [u8]>> {
    let bytes = path_bytes(path);
    if bytes.contains(&b'\n') {
        None
    } else {
        Some(bytes)
    }
}

fn write_folder<W: Write>(w: &mut W, folder: &FolderRecord, path: &[u8]) -> io::Result<()> {
    w.write_all(b"p ")?;
    w.write_all(path)?;
    w.write_all(b"\nf")?;
    for size in folder.files() {
        write!(w, " {}", size)?;
    }
    w.write_all(b"\n")
}

/// Write a raw scan: every folder followed by the end marker.
///
/// Folders whose path contains a newline are skipped. Returns the number of
/// folders written.
pub fn write_folders<W: Write>(w: &mut W, folders: &[FolderRef]) -> io::Result<usize> {
    let mut written = 0;
    for folder in folders {
        let Some(path) = encodable_path(folder.path()) else {
            log::warn!("Not persisting folder with newline in path: {:?}", folder.path());
            continue;
        };
        write_folder(w, folder, &path)?;
        written += 1;
    }
    w.write_all(END_MARKER)?;
    w.write_all(b"\n")?;
    Ok(written)
}

/// Write a dupe set.
///
/// Each referenced folder is emitted once, on first reference, then one `d`
/// line per candidate. Returns the number of candidates written.
pub fn write_dupes<W: Write>(w: &mut W, dupes: &[DupeCandidate]) -> io::Result<usize> {
    let mut index: HashMap<*const FolderRecord, usize> = HashMap::new();
    let mut lines = Vec::with_capacity(dupes.len());

    for dupe in dupes {
        if dupe
            .folders()
            .iter()
            .any(|f| encodable_path(f.path()).is_none())
        {
            log::warn!(
                "Not persisting candidate with newline in path: {:?} / {:?}",
                dupe.a.path(),
                dupe.b.path()
            );
            continue;
        }

        let mut ids = [0usize; 2];
        for (slot, folder) in ids.iter_mut().zip(dupe.folders()) {
            let next = index.len();
            *slot = match index.get(&Arc::as_ptr(folder)) {
                Some(&i) => i,
                None => {
                    if let Some(path) = encodable_path(folder.path()) {
                        write_folder(w, folder, &path)?;
                    }
                    index.insert(Arc::as_ptr(folder), next);
                    next
                }
            };
        }
        lines.push((dupe.permille(), ids[0], ids[1]));
    }

    for (permille, i, j) in &lines {
        writeln!(w, "d {} {} {}", permille, i, j)?;
    }
    w.write_all(END_MARKER)?;
    w.write_all(b"\n")?;
    Ok(lines.len())
}

fn corrupt(line: usize, reason: impl Into<String>) -> SnapshotError {
    SnapshotError::Corrupt {
        line,
        reason: reason.into(),
    }
}

fn parse_int<T: std::str::FromStr>(token: &[u8], line: usize) -> Result<T, SnapshotError> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            corrupt(
                line,
                format!("invalid number {:?}", String::from_utf8_lossy(token)),
            )
        })
}

/// Line reader that tracks line numbers and strips the `\n` terminator.
///
/// A `\r` before it is part of the line.
struct Lines<R> {
    reader: R,
    line: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> Lines<R> {
    /// Next line with its 1-based number.
    fn next(&mut self) -> Result<Option<(usize, &[u8])>, SnapshotError> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        Ok(Some((self.line, &self.buf)))
    }
}

/// Decode a stream written by [`write_folders`] or [`write_dupes`].
///
/// # Errors
///
/// [`SnapshotError::Corrupt`] on an unexpected line, a `p` line without its
/// `f` companion, a bad number, an out-of-range index or a missing end
/// marker. [`SnapshotError::Io`] if reading fails.
pub fn read_stream<R: BufRead>(reader: R) -> Result<Decoded, SnapshotError> {
    let mut lines = Lines {
        reader,
        line: 0,
        buf: Vec::new(),
    };
    let mut decoded = Decoded::default();

    loop {
        let last_line = lines.line;
        let Some((line_no, line)) = lines.next()? else {
            return Err(corrupt(last_line, "missing end marker"));
        };

        if let Some(path) = line.strip_prefix(b"p ") {
            let path = path_from_bytes(path).ok_or_else(|| corrupt(line_no, "invalid path"))?;

            let Some((line_no, sizes)) = lines.next()? else {
                return Err(corrupt(line_no, "folder without size line"));
            };
            let Some(sizes) = sizes.strip_prefix(b"f") else {
                return Err(corrupt(line_no, "expected size line after folder"));
            };
            let files = sizes
                .split(|&b| b == b' ')
                .filter(|t| !t.is_empty())
                .map(|t| parse_int::<u64>(t, line_no))
                .collect::<Result<Vec<_>, _>>()?;

            decoded.folders.push(FolderRecord::shared(path, files));
        } else if let Some(rest) = line.strip_prefix(b"d ") {
            let fields: Vec<&[u8]> = rest.split(|&b| b == b' ').collect();
            let [permille, i, j] = fields[..] else {
                return Err(corrupt(line_no, "dupe line needs three fields"));
            };
            let permille: u32 = parse_int(permille, line_no)?;
            let i: usize = parse_int(i, line_no)?;
            let j: usize = parse_int(j, line_no)?;

            let lookup = |idx: usize| {
                decoded
                    .folders
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| corrupt(line_no, format!("folder index {} out of range", idx)))
            };
            let (a, b) = (lookup(i)?, lookup(j)?);
            decoded
                .dupes
                .push(DupeCandidate::new(f64::from(permille) / 1000.0, a, b));
        } else if line == END_MARKER {
            return Ok(decoded);
        } else {
            return Err(corrupt(
                line_no,
                format!("unexpected line {:?}", String::from_utf8_lossy(line)),
            ));
        }
    }
}
