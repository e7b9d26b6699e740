use foldupe::cache::{CacheEntry, HashCache};
use foldupe::duplicates::DupeCandidate;
use foldupe::scanner::{FolderRecord, MIB};
use foldupe::snapshot::SnapshotStore;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

fn sample_dupes() -> Vec<DupeCandidate> {
    let a = FolderRecord::shared("/data/a", vec![MIB, 2 * MIB, 3 * MIB]);
    let b = FolderRecord::shared("/data/b", vec![MIB, 2 * MIB, 4 * MIB]);
    let c = FolderRecord::shared("/data/c", vec![MIB, 2 * MIB, 3 * MIB]);
    vec![
        DupeCandidate::new(2.0 / 3.0, Arc::clone(&a), Arc::clone(&b)),
        DupeCandidate::new(1.0, Arc::clone(&a), c),
    ]
}

#[test]
fn test_snapshot_round_trip() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let folders = vec![
        FolderRecord::shared("/data/a", vec![MIB, 2 * MIB, 3 * MIB]),
        FolderRecord::shared("/data/with space", vec![5, 6, 7]),
    ];

    store.save_snapshot(&folders).unwrap();
    let loaded = store.load_snapshot().unwrap().unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].path(), PathBuf::from("/data/with space"));
    assert_eq!(loaded[1].files(), &[5, 6, 7]);
    // No temp file is left behind
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[test]
fn test_dupeset_preserves_shared_folders() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());

    store.save_dupeset(&sample_dupes()).unwrap();
    let loaded = store.load_dupeset().unwrap().unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].permille(), 666);
    assert_eq!(loaded[1].permille(), 1000);
    assert!(Arc::ptr_eq(&loaded[0].a, &loaded[1].a));
    assert!(!Arc::ptr_eq(&loaded[0].b, &loaded[1].b));
    assert_eq!(loaded[0].b.files(), &[MIB, 2 * MIB, 4 * MIB]);
}

#[test]
fn test_missing_files_load_as_none() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("never-created"));

    assert!(store.load_snapshot().unwrap().is_none());
    assert!(store.load_dupeset_or_discard().is_none());
}

#[test]
fn test_corrupt_dupeset_is_discarded() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let path = store.dupeset_path();

    let bad = zstd::encode_all(&b"p /x\nf 1 2\nd 900 0 7\neof\n"[..], 0).unwrap();
    fs::write(&path, bad).unwrap();

    let err = store.load_dupeset().unwrap_err();
    assert!(err.is_corrupt());
    assert!(store.load_dupeset_or_discard().is_none());
    assert!(!path.exists());
}

#[test]
fn test_truncated_snapshot_is_discarded() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let path = store.snapshot_path();

    // Valid lines but no end marker
    let bad = zstd::encode_all(&b"p /x\nf 1 2 3\n"[..], 0).unwrap();
    fs::write(&path, bad).unwrap();

    assert!(store.load_snapshot_or_discard().is_none());
    assert!(!path.exists());
}

#[test]
fn test_garbage_is_not_zstd() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    fs::write(store.snapshot_path(), b"definitely not compressed").unwrap();

    assert!(store.load_snapshot_or_discard().is_none());
}

#[test]
fn test_clear_dupeset_keeps_snapshot() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save_snapshot(&[]).unwrap();
    store.save_dupeset(&sample_dupes()).unwrap();

    assert!(store.clear_dupeset().unwrap());
    assert!(!store.clear_dupeset().unwrap());
    assert!(store.load_snapshot().unwrap().is_some());
    assert!(store.load_dupeset().unwrap().is_none());
}

#[test]
fn test_clear_all_counts_files() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save_snapshot(&[]).unwrap();
    store.save_dupeset(&sample_dupes()).unwrap();
    fs::write(store.hash_log_path(), b"").unwrap();

    assert_eq!(store.clear_all().unwrap(), 3);
    assert_eq!(store.clear_all().unwrap(), 0);
}

#[test]
fn test_hash_log_survives_reopen() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let log_path = store.hash_log_path();

    {
        let cache = HashCache::open(&log_path).unwrap();
        cache
            .insert(CacheEntry {
                path: PathBuf::from("/data/a/one.bin"),
                size: 10,
                mtime: 42,
                hash: "abc".into(),
            })
            .unwrap();
    }

    let cache = HashCache::open(&log_path).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.lookup(&PathBuf::from("/data/a/one.bin"), 10, 42),
        Some("abc".to_string())
    );
    // Stale size or mtime misses
    assert!(cache.lookup(&PathBuf::from("/data/a/one.bin"), 11, 42).is_none());
    assert!(cache.lookup(&PathBuf::from("/data/a/one.bin"), 10, 43).is_none());
}

#[test]
fn test_hash_log_reset_on_corruption() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("hashes.log");
    fs::write(&log_path, b"not a number\n").unwrap();

    assert!(HashCache::open(&log_path).is_err());
    let cache = HashCache::open_or_reset(&log_path).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_hash_log_drops_torn_tail() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("hashes.log");
    fs::write(&log_path, b"5 1 h1 /x/a\n6 2 h2 /x/b").unwrap();

    let cache = HashCache::open(&log_path).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(fs::read(&log_path).unwrap(), b"5 1 h1 /x/a\n");
}
