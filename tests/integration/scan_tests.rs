use foldupe::progress::ScanObserver;
use foldupe::scanner::{DirectoryScanner, ScanError, MIB};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

fn sparse(path: &Path, len: u64) {
    File::create(path).unwrap().set_len(len).unwrap();
}

fn folder_with(dir: &Path, sizes: &[u64]) {
    fs::create_dir_all(dir).unwrap();
    for (i, &size) in sizes.iter().enumerate() {
        sparse(&dir.join(format!("f{}.bin", i)), size);
    }
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let report = DirectoryScanner::new().scan(dir.path()).unwrap();

    assert!(report.folders.is_empty());
    assert!(!report.has_errors());
}

#[test]
fn test_scan_records_qualifying_folders() {
    let dir = tempdir().unwrap();
    folder_with(&dir.path().join("a"), &[MIB, 2 * MIB, 3 * MIB]);
    folder_with(&dir.path().join("b"), &[MIB, 2 * MIB, 4 * MIB]);

    let report = DirectoryScanner::new().scan(dir.path()).unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();

    assert_eq!(report.folders.len(), 2);
    assert_eq!(report.folders[0].path(), root.join("a"));
    assert_eq!(report.folders[1].path(), root.join("b"));
    assert_eq!(report.folders[0].files(), &[MIB, 2 * MIB, 3 * MIB]);
    assert_eq!(report.folders[1].total_size(), 7 * MIB);
}

#[test]
fn test_scan_skips_small_and_empty_files() {
    let dir = tempdir().unwrap();
    // Only two files: not enough for a folder under the large threshold
    folder_with(&dir.path().join("pair"), &[MIB, MIB]);
    // Three files but not more than a mebibyte in total
    folder_with(&dir.path().join("tiny"), &[10, 20, 30]);
    // Empty files do not count
    let padded = dir.path().join("padded");
    folder_with(&padded, &[MIB, MIB]);
    sparse(&padded.join("empty"), 0);

    let report = DirectoryScanner::new().scan(dir.path()).unwrap();
    assert!(report.folders.is_empty());
}

#[test]
fn test_scan_is_post_order() {
    let dir = tempdir().unwrap();
    let parent = dir.path().join("parent");
    folder_with(&parent, &[MIB, MIB, MIB]);
    folder_with(&parent.join("child"), &[MIB, MIB, MIB]);

    let report = DirectoryScanner::new().scan(dir.path()).unwrap();
    let names: Vec<_> = report
        .folders
        .iter()
        .map(|f| f.path().file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["child", "parent"]);
    // Subdirectories are not files of the parent
    assert_eq!(report.folders[1].file_count(), 3);
}

#[test]
fn test_scan_missing_root_is_reported() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");

    let report = DirectoryScanner::new().scan(&missing).unwrap();
    assert!(report.folders.is_empty());
    assert!(matches!(report.errors[0], ScanError::NotFound(_)));
}

#[test]
fn test_scan_file_root_is_reported() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("file");
    sparse(&file, 5);

    let report = DirectoryScanner::new().scan(&file).unwrap();
    assert!(matches!(report.errors[0], ScanError::NotADirectory(_)));
}

#[test]
fn test_scan_all_concatenates_roots() {
    let one = tempdir().unwrap();
    let two = tempdir().unwrap();
    folder_with(&one.path().join("x"), &[MIB, MIB, MIB]);
    folder_with(&two.path().join("y"), &[MIB, MIB, MIB]);

    let report = DirectoryScanner::new()
        .scan_all(&[two.path(), one.path()])
        .unwrap();

    assert_eq!(report.folders.len(), 2);
    assert!(report.folders[0].path().ends_with("y"));
    assert!(report.folders[1].path().ends_with("x"));
}

#[test]
fn test_scan_cancelled() {
    let dir = tempdir().unwrap();
    folder_with(&dir.path().join("a"), &[MIB, MIB, MIB]);

    let flag = Arc::new(AtomicBool::new(true));
    let result = DirectoryScanner::new()
        .with_shutdown_flag(flag)
        .scan(dir.path());

    assert!(matches!(result, Err(ScanError::Cancelled)));
}

#[cfg(unix)]
#[test]
fn test_scan_ignores_symlinks() {
    let dir = tempdir().unwrap();
    let real = dir.path().join("real");
    folder_with(&real, &[MIB, MIB, MIB]);

    let links = dir.path().join("links");
    fs::create_dir(&links).unwrap();
    for i in 0..3 {
        std::os::unix::fs::symlink(real.join(format!("f{}.bin", i)), links.join(i.to_string()))
            .unwrap();
    }
    std::os::unix::fs::symlink(&real, dir.path().join("loop")).unwrap();

    let report = DirectoryScanner::new().scan(dir.path()).unwrap();
    assert_eq!(report.folders.len(), 1);
    assert!(report.folders[0].path().ends_with("real"));
}

/// Raises the shutdown flag once the walk is two levels below `root`.
struct CancelBelow {
    root: PathBuf,
    flag: Arc<AtomicBool>,
    seen: Mutex<Vec<PathBuf>>,
}

impl ScanObserver for CancelBelow {
    fn on_directory(&self, path: &Path) {
        self.seen.lock().unwrap().push(path.to_path_buf());
        let depth = path
            .strip_prefix(&self.root)
            .map(|rel| rel.components().count())
            .unwrap_or(0);
        if depth >= 2 {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_scan_cancelled_from_nested_directory() {
    let dir = tempdir().unwrap();
    folder_with(&dir.path().join("a/b/c"), &[MIB, MIB, MIB]);
    folder_with(&dir.path().join("z"), &[MIB, MIB, MIB]);
    let root = fs::canonicalize(dir.path()).unwrap();

    let flag = Arc::new(AtomicBool::new(false));
    let observer = Arc::new(CancelBelow {
        root: root.clone(),
        flag: Arc::clone(&flag),
        seen: Mutex::new(Vec::new()),
    });
    let result = DirectoryScanner::new()
        .with_shutdown_flag(Arc::clone(&flag))
        .with_observer(observer.clone())
        .with_progress_interval(Duration::ZERO)
        .scan(dir.path());

    assert!(matches!(result, Err(ScanError::Cancelled)));
    let seen = observer.seen.lock().unwrap();
    assert_eq!(seen.last().unwrap(), &root.join("a/b"));
    // The walk stops before reaching the later sibling
    assert!(!seen.contains(&root.join("z")));
}

#[test]
fn test_zero_interval_notifies_every_directory() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();

    let observer = Arc::new(CancelBelow {
        root: root.clone(),
        flag: Arc::new(AtomicBool::new(false)),
        seen: Mutex::new(Vec::new()),
    });
    DirectoryScanner::new()
        .with_observer(observer.clone())
        .with_progress_interval(Duration::ZERO)
        .scan(dir.path())
        .unwrap();

    let seen = observer.seen.lock().unwrap();
    assert_eq!(*seen, vec![root.clone(), root.join("a"), root.join("b")]);
}

#[cfg(unix)]
#[test]
fn test_scan_unreadable_subdirectory_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let parent = dir.path().join("parent");
    folder_with(&parent, &[MIB, MIB, MIB]);
    let locked = parent.join("locked");
    folder_with(&locked, &[MIB, MIB, MIB]);
    folder_with(&parent.join("sibling"), &[MIB, MIB, MIB]);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Running with CAP_DAC_OVERRIDE: permissions are not enforced
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let report = DirectoryScanner::new().scan(dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let report = report.unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();

    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, ScanError::AccessDenied(p) if p.ends_with("locked"))));
    let paths: Vec<_> = report.folders.iter().map(|f| f.path().to_path_buf()).collect();
    assert_eq!(paths, vec![root.join("parent/sibling"), root.join("parent")]);
}
