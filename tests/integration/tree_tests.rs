use foldupe::duplicates::scorer::ScoreConfig;
use foldupe::duplicates::{CandidateScorer, DupeCandidate};
use foldupe::scanner::{DirectoryScanner, MIB};
use foldupe::tree::{rows, Category, DupeTreeBuilder};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn sparse(path: &Path, len: u64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    File::create(path).unwrap().set_len(len).unwrap();
}

/// Two overlapping folders `a` and `b` plus a few unrelated ones.
fn fixture() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (name, size) in [("one", MIB), ("two", 2 * MIB), ("three", 3 * MIB)] {
        sparse(&root.join("a").join(name), size);
    }
    for (name, size) in [("uno", MIB), ("dos", 2 * MIB), ("cuatro", 4 * MIB)] {
        sparse(&root.join("b").join(name), size);
    }
    sparse(&root.join("plain").join("notes.txt"), 10);
    sparse(&root.join("z1").join("x"), 11);
    sparse(&root.join("z2").join("x"), 12);
    (dir, root)
}

fn dupes_under(root: &Path) -> Vec<DupeCandidate> {
    let report = DirectoryScanner::new().scan(root).unwrap();
    CandidateScorer::new(ScoreConfig::default())
        .score_all(&report.folders)
        .unwrap()
}

#[test]
fn test_empty_dupe_set_has_no_tree() {
    assert!(DupeTreeBuilder::default().build(&[]).is_none());
}

#[test]
fn test_tree_rooted_at_common_ancestor() {
    let (_dir, root) = fixture();
    let dupes = dupes_under(&root);
    assert_eq!(dupes.len(), 1);

    let tree = DupeTreeBuilder::default().build(&dupes).unwrap();

    assert_eq!(tree.path, root);
    assert_eq!(tree.category(), Category::MixedDupeBelow);
    assert_eq!(tree.cumulative_dupesize, 6 * MIB);

    let a = tree.find(&root.join("a")).unwrap();
    assert_eq!(a.category(), Category::Dupe);
    assert_eq!(a.dupesize, 3 * MIB);
    assert!((a.scur.unwrap() - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_noise_siblings_collapse() {
    let (_dir, root) = fixture();
    let tree = DupeTreeBuilder::default()
        .build(&dupes_under(&root))
        .unwrap();

    // One dupe-free sibling survives after the dupes; the rest of the run is dropped
    assert_eq!(tree.child_names(), vec!["a", "b", "plain"]);
    let plain = tree.find(&root.join("plain")).unwrap();
    assert_eq!(plain.category(), Category::Unique);
}

#[test]
fn test_unfiltered_tree_keeps_everything() {
    let (_dir, root) = fixture();
    let tree = DupeTreeBuilder::default()
        .build_unfiltered(&dupes_under(&root))
        .unwrap();

    assert_eq!(tree.child_names(), vec!["a", "b", "plain", "z1", "z2"]);
}

#[test]
fn test_extra_levels_reveal_unique_content_below() {
    let (_dir, root) = fixture();
    sparse(&root.join("a").join("extras").join("bonus.bin"), 100);
    let dupes = dupes_under(&root);

    let shallow = DupeTreeBuilder::new(0).build_unfiltered(&dupes).unwrap();
    let a = shallow.find(&root.join("a")).unwrap();
    assert!(!a.dirs[OsStr::new("extras")].is_loaded());
    assert_eq!(a.category(), Category::Dupe);

    let deep = DupeTreeBuilder::new(1).build_unfiltered(&dupes).unwrap();
    let a = deep.find(&root.join("a")).unwrap();
    assert!(a.dirs[OsStr::new("extras")].is_loaded());
    assert_eq!(a.category(), Category::MixedUniqueBelow);
}

#[test]
fn test_rows_flatten_pre_order() {
    let (_dir, root) = fixture();
    let tree = DupeTreeBuilder::default()
        .build(&dupes_under(&root))
        .unwrap();

    let rows = rows(&tree);
    let names: Vec<(usize, &str)> = rows.iter().map(|r| (r.depth, r.name.as_str())).collect();

    assert_eq!(names[0].0, 0);
    assert_eq!(rows[0].path, root);
    assert_eq!(&names[1..], &[(1, "a"), (1, "b"), (1, "plain")]);
    assert_eq!(rows[1].category, Category::Dupe);
}
