//! Building the dupe tree from a candidate list.
//!
//! # Algorithm
//!
//! 1. **Materialize**: for every candidate folder, walk from the common root
//!    down to it, loading each node on the way. Every child that is not the
//!    next path segment is expanded `extra_levels` deep for context, and so
//!    are the children of the folder itself.
//! 2. **Annotate**: each candidate folder gets its best score as `scur` and
//!    its largest matched byte count as `dupesize`.
//! 3. **Propagate** (post-order): `smin`/`smax` cover the node's own score
//!    and every non-neutral child. Loaded files that belong to no candidate
//!    count as unique content; unvisited subtrees stay neutral.
//! 4. **Filter** (pre-order): runs of dupe-free siblings collapse to a single
//!    representative, and a dupe-free node under a dupe-free parent keeps one
//!    child so the branch is never emptied.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use super::node::{DirNode, SCORE_NEUTRAL, SCORE_NO_DUPES};
use crate::duplicates::DupeCandidate;

/// Default number of context levels expanded beside each dupe path.
pub const DEFAULT_EXTRA_LEVELS: usize = 1;

/// Builds a filtered [`DirNode`] tree from dupe candidates.
#[derive(Debug, Clone, Copy)]
pub struct DupeTreeBuilder {
    extra_levels: usize,
}

impl Default for DupeTreeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRA_LEVELS)
    }
}

/// Best score and largest overlap seen for one folder.
#[derive(Debug, Clone, Copy)]
struct Annotation {
    score: f64,
    dupesize: u64,
}

impl DupeTreeBuilder {
    #[must_use]
    pub fn new(extra_levels: usize) -> Self {
        Self { extra_levels }
    }

    /// Build, annotate, propagate and filter the tree.
    ///
    /// Returns `None` for an empty candidate list.
    #[must_use]
    pub fn build(&self, dupes: &[DupeCandidate]) -> Option<DirNode> {
        let mut root = self.build_unfiltered(dupes)?;
        filter_noise(&mut root, false);
        Some(root)
    }

    /// Like [`build`](Self::build) but without noise filtering.
    #[must_use]
    pub fn build_unfiltered(&self, dupes: &[DupeCandidate]) -> Option<DirNode> {
        let annotations = annotate(dupes);
        let root_path = common_ancestor(annotations.keys().map(PathBuf::as_path))?;
        log::debug!(
            "Building dupe tree for {} folders under {}",
            annotations.len(),
            root_path.display()
        );

        let mut paths: Vec<_> = annotations.into_iter().collect();
        paths.sort_by(|a, b| a.0.cmp(&b.0));

        let mut root = DirNode::new(&root_path);
        for (path, annotation) in paths {
            let Ok(rest) = path.strip_prefix(&root_path) else {
                continue;
            };
            let node = self.materialize(&mut root, rest);
            node.scur = Some(node.scur.map_or(annotation.score, |s| s.max(annotation.score)));
            node.dupesize = node.dupesize.max(annotation.dupesize);
        }

        propagate(&mut root);
        Some(root)
    }

    /// Load the path from `root` down to `rest`, returning the endpoint.
    fn materialize<'a>(&self, root: &'a mut DirNode, rest: &Path) -> &'a mut DirNode {
        let mut node = root;
        for component in rest.components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            let key = segment.to_os_string();

            node.ensure_loaded();
            for (name, child) in &mut node.dirs {
                if *name != key {
                    expand(child, self.extra_levels);
                }
            }
            let path = node.path.join(segment);
            node = node.dirs.entry(key).or_insert_with(|| DirNode::new(path));
        }

        node.ensure_loaded();
        for child in node.dirs.values_mut() {
            expand(child, self.extra_levels);
        }
        node
    }
}

/// Load `node` and its descendants down to `levels` deep.
fn expand(node: &mut DirNode, levels: usize) {
    if levels == 0 {
        return;
    }
    node.ensure_loaded();
    for child in node.dirs.values_mut() {
        expand(child, levels - 1);
    }
}

fn annotate(dupes: &[DupeCandidate]) -> HashMap<PathBuf, Annotation> {
    let mut annotations: HashMap<PathBuf, Annotation> = HashMap::new();
    for dupe in dupes {
        let dupesize = dupe.overlap().hit_bytes;
        for folder in dupe.folders() {
            annotations
                .entry(folder.path().to_path_buf())
                .and_modify(|a| {
                    a.score = a.score.max(dupe.score);
                    a.dupesize = a.dupesize.max(dupesize);
                })
                .or_insert(Annotation {
                    score: dupe.score,
                    dupesize,
                });
        }
    }
    annotations
}

/// Deepest path that is an ancestor of (or equal to) every input path.
#[must_use]
pub fn common_ancestor<'a>(mut paths: impl Iterator<Item = &'a Path>) -> Option<PathBuf> {
    let first = paths.next()?;
    let mut common: Vec<Component<'a>> = first.components().collect();
    for path in paths {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| *a == b)
            .count();
        common.truncate(shared);
    }
    Some(common.iter().collect())
}

/// Bottom-up score propagation.
pub fn propagate(node: &mut DirNode) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut visited = false;

    let own = match node.scur {
        Some(score) => Some(score),
        None if node.files.iter().any(|f| f.size > 0) => Some(SCORE_NO_DUPES),
        None => None,
    };
    if let Some(score) = own {
        lo = lo.min(score);
        hi = hi.max(score);
        visited = true;
    }

    let mut cumulative = node.dupesize;
    for child in node.dirs.values_mut() {
        propagate(child);
        cumulative += child.cumulative_dupesize;
        if !child.is_neutral() {
            lo = lo.min(child.smin);
            hi = hi.max(child.smax);
            visited = true;
        }
    }

    node.cumulative_dupesize = cumulative;
    if visited {
        node.smin = lo;
        node.smax = hi;
    } else {
        node.smin = SCORE_NEUTRAL;
        node.smax = SCORE_NEUTRAL;
    }
}

/// Collapse runs of dupe-free children, top-down.
pub fn filter_noise(node: &mut DirNode, parent_has_dupes: bool) {
    let node_has_dupes = node.has_dupes();
    let mut kept = BTreeMap::new();
    let mut first_dropped = None;
    let mut previous_dupe_free = false;

    for (name, child) in std::mem::take(&mut node.dirs) {
        let dupe_free = !child.has_dupes();
        if dupe_free && (!node_has_dupes || previous_dupe_free) {
            if first_dropped.is_none() {
                first_dropped = Some((name, child));
            }
            continue;
        }
        previous_dupe_free = dupe_free;
        kept.insert(name, child);
    }

    if kept.is_empty() && !node_has_dupes && !parent_has_dupes {
        if let Some((name, child)) = first_dropped {
            kept.insert(name, child);
        }
    }

    for child in kept.values_mut() {
        filter_noise(child, node_has_dupes);
    }
    node.dirs = kept;
}
