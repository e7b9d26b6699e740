use foldupe::actions::{
    delete_files, rename_to_match, sync_mtimes, ActionError, DeleteConfig,
};
use foldupe::cache::HashCache;
use foldupe::hashing::{
    compare_folders, stat_folder_files, FolderComparison, Hasher, HashWorkerPool,
};
use foldupe::scanner::{FolderRecord, FolderRef};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// `keep` holds `one`, `two`; `other` holds `uno` (= one), `dos` (= two) and `solo`.
fn verified_pair() -> (TempDir, FolderRef, FolderRef, FolderComparison) {
    let dir = TempDir::new().unwrap();
    let keep = dir.path().join("keep");
    let other = dir.path().join("other");
    fs::create_dir_all(&keep).unwrap();
    fs::create_dir_all(&other).unwrap();
    fs::write(keep.join("one"), b"first").unwrap();
    fs::write(keep.join("two"), b"second").unwrap();
    fs::write(other.join("uno"), b"first").unwrap();
    fs::write(other.join("dos"), b"second").unwrap();
    fs::write(other.join("solo"), b"nothing like it").unwrap();

    let pool = HashWorkerPool::new(Arc::new(HashCache::in_memory()), Hasher::new());
    let mut records = Vec::new();
    for path in [&keep, &other] {
        let files = stat_folder_files(path).unwrap();
        let record = FolderRecord::shared(path, files.iter().map(|f| f.size).collect());
        pool.request(&record, files).unwrap();
        records.push(record);
    }
    pool.terminate();

    let other_rec = records.pop().unwrap();
    let keep_rec = records.pop().unwrap();
    let cmp = compare_folders(&keep_rec, &other_rec);
    (dir, keep_rec, other_rec, cmp)
}

fn matched_in(dir: &Path, cmp: &FolderComparison) -> Vec<PathBuf> {
    cmp.matched.iter().map(|(_, o)| dir.join(o)).collect()
}

#[test]
fn test_delete_verified_files_keeps_unmatched() {
    let (_dir, _keep, other, cmp) = verified_pair();
    let paths = matched_in(other.path(), &cmp);

    let result = delete_files(&paths, &DeleteConfig::permanent());

    assert!(result.all_succeeded());
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.bytes_freed, 11);
    assert!(other.path().join("solo").exists());
    assert!(result.removed_dirs.is_empty());
}

#[test]
fn test_delete_removes_emptied_folder() {
    let (_dir, _keep, other, cmp) = verified_pair();
    fs::remove_file(other.path().join("solo")).unwrap();

    let result = delete_files(&matched_in(other.path(), &cmp), &DeleteConfig::permanent());

    assert_eq!(result.removed_dirs, vec![other.path().to_path_buf()]);
    assert!(!other.path().exists());
}

#[test]
fn test_delete_reports_missing_files() {
    let (_dir, _keep, other, cmp) = verified_pair();
    let mut paths = matched_in(other.path(), &cmp);
    paths.push(other.path().join("never-existed"));

    let result = delete_files(&paths, &DeleteConfig::permanent());
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 1);
    assert!(!result.all_succeeded());
}

#[test]
fn test_rename_to_match_keep_names() {
    let (_dir, _keep, other, cmp) = verified_pair();
    let pairs: Vec<(PathBuf, PathBuf)> = cmp
        .matched
        .iter()
        .map(|(k, o)| (other.path().join(o), other.path().join(k)))
        .collect();

    assert_eq!(rename_to_match(&pairs).unwrap(), 2);
    assert_eq!(fs::read(other.path().join("one")).unwrap(), b"first");
    assert_eq!(fs::read(other.path().join("two")).unwrap(), b"second");
    assert!(!other.path().join("uno").exists());
}

#[test]
fn test_rename_refuses_to_clobber() {
    let (_dir, _keep, other, _cmp) = verified_pair();
    let pairs = vec![(other.path().join("uno"), other.path().join("solo"))];

    let err = rename_to_match(&pairs).unwrap_err();
    assert!(matches!(err, ActionError::DestinationExists(_)));
    assert!(other.path().join("uno").exists());
}

#[test]
fn test_sync_mtimes_from_keep() {
    let (_dir, keep, other, cmp) = verified_pair();
    let old = filetime::FileTime::from_unix_time(1_000_000_000, 0);
    for (k, _) in &cmp.matched {
        filetime::set_file_mtime(keep.path().join(k), old).unwrap();
    }
    let pairs: Vec<(PathBuf, PathBuf)> = cmp
        .matched
        .iter()
        .map(|(k, o)| (keep.path().join(k), other.path().join(o)))
        .collect();

    assert_eq!(sync_mtimes(&pairs).unwrap(), 2);
    for (_, o) in &cmp.matched {
        let meta = fs::metadata(other.path().join(o)).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&meta), old);
    }
}

#[cfg(unix)]
#[test]
fn test_symlinks_point_at_kept_files() {
    use foldupe::actions::replace_with_symlinks;
    use std::ffi::OsString;

    let (_dir, keep, other, cmp) = verified_pair();
    let (kept, nuked): (Vec<OsString>, Vec<OsString>) = cmp.matched.iter().cloned().unzip();

    let replaced = replace_with_symlinks(keep.path(), &kept, other.path(), &nuked).unwrap();

    assert_eq!(replaced.len(), 2);
    for (k, o) in &cmp.matched {
        let link = other.path().join(o);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), keep.path().join(k));
    }
    // Content is still reachable through the link
    assert_eq!(fs::read(other.path().join("uno")).unwrap(), b"first");
}
