//! Lazily loaded directory nodes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::category::{classify, Category};
use crate::scanner::{list_folder, EntryKind};

/// Score of a subtree in which nothing has been visited.
pub const SCORE_NEUTRAL: f64 = -1.0;

/// Score of visited content that belongs to no dupe.
pub const SCORE_NO_DUPES: f64 = 0.0;

/// Regular file directly inside a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLeaf {
    pub name: OsString,
    pub size: u64,
}

/// Whether a node's own listing has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loaded,
    /// Listing failed; the node keeps any children inserted by path.
    Failed(String),
}

/// A directory in the dupe tree.
#[derive(Debug, Clone)]
pub struct DirNode {
    pub path: PathBuf,
    pub state: LoadState,
    /// Child directories by raw name.
    pub dirs: BTreeMap<OsString, DirNode>,
    /// Files directly inside, once loaded.
    pub files: Vec<FileLeaf>,
    /// Lowest score anywhere in the subtree.
    pub smin: f64,
    /// Highest score anywhere in the subtree.
    pub smax: f64,
    /// Best score of candidates this folder is itself part of.
    pub scur: Option<f64>,
    /// Largest matched byte count of candidates this folder is part of.
    pub dupesize: u64,
    /// Sum of `dupesize` over the subtree.
    pub cumulative_dupesize: u64,
}

impl DirNode {
    /// Unloaded node with neutral scores.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: LoadState::NotLoaded,
            dirs: BTreeMap::new(),
            files: Vec::new(),
            smin: SCORE_NEUTRAL,
            smax: SCORE_NEUTRAL,
            scur: None,
            dupesize: 0,
            cumulative_dupesize: 0,
        }
    }

    /// Read this node's listing once. Later calls do nothing.
    ///
    /// Symlinks are neither followed nor shown. Children already present
    /// are kept.
    pub fn ensure_loaded(&mut self) {
        if self.state != LoadState::NotLoaded {
            return;
        }
        match list_folder(&self.path) {
            Ok(entries) => {
                for entry in entries {
                    match entry.kind {
                        EntryKind::Dir => {
                            let path = self.path.join(&entry.name);
                            self.dirs
                                .entry(entry.name)
                                .or_insert_with(|| DirNode::new(path));
                        }
                        EntryKind::File => self.files.push(FileLeaf {
                            name: entry.name,
                            size: entry.size,
                        }),
                        EntryKind::Symlink | EntryKind::Other => {}
                    }
                }
                self.state = LoadState::Loaded;
            }
            Err(e) => {
                log::warn!("Cannot list {}: {}", self.path.display(), e);
                self.state = LoadState::Failed(e.to_string());
            }
        }
    }

    /// Whether the listing has been attempted.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state != LoadState::NotLoaded
    }

    /// Last path component, or the whole path for a root.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Whether any dupe exists in this subtree.
    #[must_use]
    pub fn has_dupes(&self) -> bool {
        self.smax > SCORE_NO_DUPES
    }

    /// Whether nothing in this subtree has been visited.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.smax == SCORE_NEUTRAL && self.smin == SCORE_NEUTRAL && self.scur.is_none()
    }

    /// Display category of this node.
    #[must_use]
    pub fn category(&self) -> Category {
        classify(self.smin, self.smax, self.scur)
    }

    /// Find a descendant (or this node) by absolute path.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<&DirNode> {
        let rest = path.strip_prefix(&self.path).ok()?;
        let mut node = self;
        for component in rest.components() {
            node = node.dirs.get(component.as_os_str())?;
        }
        Some(node)
    }

    /// Display names of the child directories, in order.
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        self.dirs
            .keys()
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}
