use foldupe::cache::HashCache;
use foldupe::hashing::{
    compare_folders, stat_folder_files, FileStat, Hasher, HashWorkerPool, VerifyState,
};
use foldupe::scanner::{FolderRecord, FolderRef, HashState};
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn folder(dir: &Path, files: &[(&str, &[u8])]) -> (FolderRef, Vec<FileStat>) {
    fs::create_dir_all(dir).unwrap();
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    let stats = stat_folder_files(dir).unwrap();
    let record = FolderRecord::shared(dir, stats.iter().map(|f| f.size).collect());
    (record, stats)
}

fn pair(keep: &str, other: &str) -> (OsString, OsString) {
    (keep.into(), other.into())
}

fn pool_with(cache: HashCache) -> HashWorkerPool {
    HashWorkerPool::new(Arc::new(cache), Hasher::new().with_chunk_size(4))
}

#[test]
fn test_verify_identical_folders() {
    let dir = TempDir::new().unwrap();
    let (a, a_files) = folder(
        &dir.path().join("a"),
        &[("one", b"first file"), ("two", b"second file")],
    );
    let (b, b_files) = folder(
        &dir.path().join("b"),
        &[("uno", b"first file"), ("dos", b"second file")],
    );

    let pool = pool_with(HashCache::in_memory());
    pool.request(&a, a_files).unwrap();
    pool.request(&b, b_files).unwrap();
    pool.terminate();

    let cmp = compare_folders(&a, &b);
    assert_eq!(cmp.state(), VerifyState::Verified);
    assert_eq!(
        cmp.matched,
        vec![pair("one", "uno"), pair("two", "dos")]
    );
    assert_eq!(pool.stats().files_hashed, 4);
}

#[test]
fn test_verify_partial_folders() {
    let dir = TempDir::new().unwrap();
    let (a, a_files) = folder(
        &dir.path().join("a"),
        &[("same", b"shared"), ("mine", b"only in a")],
    );
    let (b, b_files) = folder(
        &dir.path().join("b"),
        &[("same", b"shared"), ("yours", b"only in b")],
    );

    let pool = pool_with(HashCache::in_memory());
    pool.request(&a, a_files).unwrap();
    pool.request(&b, b_files).unwrap();
    pool.terminate();

    let cmp = compare_folders(&a, &b);
    assert_eq!(cmp.state(), VerifyState::Partial);
    assert_eq!(cmp.unmatched_keep, vec!["mine"]);
    assert_eq!(cmp.unmatched_other, vec!["yours"]);
}

#[test]
fn test_same_size_different_content_mismatches() {
    let dir = TempDir::new().unwrap();
    let (a, a_files) = folder(&dir.path().join("a"), &[("x", b"aaaa")]);
    let (b, b_files) = folder(&dir.path().join("b"), &[("x", b"bbbb")]);

    let pool = pool_with(HashCache::in_memory());
    pool.request(&a, a_files).unwrap();
    pool.request(&b, b_files).unwrap();
    pool.terminate();

    assert_eq!(compare_folders(&a, &b).state(), VerifyState::Mismatched);
}

#[test]
fn test_vanished_file_fails() {
    let dir = TempDir::new().unwrap();
    let (a, mut files) = folder(&dir.path().join("a"), &[("here", b"content")]);
    files.push(FileStat {
        name: "gone".into(),
        size: 7,
        mtime: 0,
    });

    let pool = pool_with(HashCache::in_memory());
    pool.request(&a, files).unwrap();
    pool.terminate();

    let entry = a.hash_entry("gone").unwrap();
    assert!(matches!(entry.state, HashState::Failed(_)));
    assert_eq!(pool.stats().failures, 1);
    assert_eq!(compare_folders(&a, &a).state(), VerifyState::Failed);
}

#[test]
fn test_cached_hashes_are_reused() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("cache").join("hashes.log");
    let data = dir.path().join("data");

    {
        let (a, files) = folder(&data, &[("f", b"cache me")]);
        let pool = pool_with(HashCache::open(&log_path).unwrap());
        pool.request(&a, files).unwrap();
        pool.terminate();
        assert_eq!(pool.stats().files_hashed, 1);
    }

    // A fresh record and pool, same file on disk
    let files = stat_folder_files(&data).unwrap();
    let a = FolderRecord::shared(&data, files.iter().map(|f| f.size).collect());
    let pool = pool_with(HashCache::open(&log_path).unwrap());

    assert_eq!(pool.attach_cached(&a, &files), 1);
    pool.request(&a, files).unwrap();
    pool.terminate();

    let stats = pool.stats();
    assert_eq!(stats.files_hashed, 0);
    assert_eq!(stats.cache_hits, 1);
    assert!(a.hash_entry("f").unwrap().digest().is_some());
}

#[test]
fn test_modified_file_is_rehashed() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("hashes.log");
    let data = dir.path().join("data");
    let cache = Arc::new(HashCache::open(&log_path).unwrap());

    let (a, files) = folder(&data, &[("f", b"version one")]);
    let pool = HashWorkerPool::new(Arc::clone(&cache), Hasher::new());
    pool.request(&a, files).unwrap();
    pool.terminate();
    let first = a.hash_entry("f").unwrap().digest().unwrap().to_string();

    fs::write(data.join("f"), b"version two, longer").unwrap();
    let files = stat_folder_files(&data).unwrap();
    pool.request(&a, files).unwrap();
    pool.terminate();

    let second = a.hash_entry("f").unwrap().digest().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(pool.stats().files_hashed, 2);
}

#[test]
fn test_empty_request_is_a_no_op() {
    let pool = pool_with(HashCache::in_memory());
    let a = FolderRecord::shared("/nowhere", vec![]);

    pool.request(&a, Vec::new()).unwrap();
    assert_eq!(pool.device_count(), 0);
    assert_eq!(compare_folders(&a, &a).state(), VerifyState::NotRequested);
}

#[test]
fn test_hasher_is_chunk_independent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("f");
    fs::write(&path, vec![7u8; 10_000]).unwrap();

    let small = Hasher::new().with_chunk_size(3).hash_file(&path).unwrap();
    let large = Hasher::new().hash_file(&path).unwrap();
    assert_eq!(small, large);
}

#[cfg(unix)]
#[test]
fn test_verify_non_utf8_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    let keep_name = OsStr::from_bytes(b"caf\xe9.mkv");
    let other_name = OsStr::from_bytes(b"na\xefve.mkv");
    for (sub, name) in [("a", keep_name), ("b", other_name)] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
        fs::write(dir.path().join(sub).join(name), b"same bytes").unwrap();
    }
    let (a, a_files) = folder(&dir.path().join("a"), &[]);
    let (b, b_files) = folder(&dir.path().join("b"), &[]);

    let pool = pool_with(HashCache::in_memory());
    pool.request(&a, a_files).unwrap();
    pool.request(&b, b_files).unwrap();
    pool.terminate();

    assert_eq!(pool.stats().failures, 0);
    let cmp = compare_folders(&a, &b);
    assert_eq!(cmp.state(), VerifyState::Verified);
    assert_eq!(
        cmp.matched,
        vec![(keep_name.to_os_string(), other_name.to_os_string())]
    );
}
