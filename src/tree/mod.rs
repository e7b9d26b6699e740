//! Score-annotated directory tree over the dupe set.
//!
//! Only the parts of the filesystem touched by candidates are loaded. Each
//! node carries the lowest and highest dupe score of its subtree, its own
//! score if it is a candidate folder, and the matched byte counts below it.
//!
//! ```text
//! /srv                      mixed        0.00..0.92
//!   backup                  dupe         0.92..0.92
//!     photos                dupe         0.92 (own)
//!   photos                  dupe         0.92 (own)
//! ```

pub mod builder;
pub mod category;
pub mod node;

use std::path::PathBuf;

use crate::scanner::listing::serialize_lossy;

pub use builder::{common_ancestor, DupeTreeBuilder, DEFAULT_EXTRA_LEVELS};
pub use category::{classify, Category};
pub use node::{DirNode, FileLeaf, LoadState, SCORE_NEUTRAL, SCORE_NO_DUPES};

/// One visible node, flattened for output.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TreeRow {
    pub depth: usize,
    #[serde(serialize_with = "serialize_lossy")]
    pub path: PathBuf,
    pub name: String,
    pub category: Category,
    pub smin: f64,
    pub smax: f64,
    pub scur: Option<f64>,
    pub dupesize: u64,
    pub cumulative_dupesize: u64,
}

/// Flatten a tree in pre-order, children by name.
#[must_use]
pub fn rows(root: &DirNode) -> Vec<TreeRow> {
    let mut out = Vec::new();
    push_rows(root, 0, &mut out);
    out
}

fn push_rows(node: &DirNode, depth: usize, out: &mut Vec<TreeRow>) {
    out.push(TreeRow {
        depth,
        path: node.path.clone(),
        name: if depth == 0 {
            node.path.display().to_string()
        } else {
            node.name()
        },
        category: node.category(),
        smin: node.smin,
        smax: node.smax,
        scur: node.scur,
        dupesize: node.dupesize,
        cumulative_dupesize: node.cumulative_dupesize,
    });
    for child in node.dirs.values() {
        push_rows(child, depth + 1, out);
    }
}
