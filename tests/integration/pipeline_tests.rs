//! End-to-end runs of the CLI against a scratch tree and cache directory.

use anyhow::Result;
use clap::Parser;
use foldupe::cli::Cli;
use foldupe::error::ExitCode;
use foldupe::run_app_with;
use foldupe::scanner::MIB;
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    cache: PathBuf,
}

fn sparse(path: &Path, len: u64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    File::create(path).unwrap().set_len(len).unwrap();
}

impl Fixture {
    /// `data/a` = {one: 1M, two: 2M, three: 3M}, `data/b` = {uno: 1M, dos: 2M, cuatro: 4M}.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        let root = base.join("data");
        for (name, size) in [("one", MIB), ("two", 2 * MIB), ("three", 3 * MIB)] {
            sparse(&root.join("a").join(name), size);
        }
        for (name, size) in [("uno", MIB), ("dos", 2 * MIB), ("cuatro", 4 * MIB)] {
            sparse(&root.join("b").join(name), size);
        }
        Self {
            _dir: dir,
            root,
            cache: base.join("cache"),
        }
    }

    fn run(&self, args: &[&str]) -> (Result<ExitCode>, String) {
        let mut argv: Vec<OsString> = vec!["foldupe".into(), "-q".into(), "--cache-dir".into()];
        argv.push(self.cache.clone().into_os_string());
        argv.extend(args.iter().map(OsString::from));
        let cli = Cli::try_parse_from(argv).unwrap();

        let mut out = Vec::new();
        let result = run_app_with(cli, &mut out, false);
        (result, String::from_utf8(out).unwrap())
    }

    fn ok(&self, args: &[&str]) -> (ExitCode, String) {
        let (result, out) = self.run(args);
        (result.unwrap(), out)
    }

    fn scan(&self, extra: &[&str]) -> (ExitCode, String) {
        let root = self.root.to_str().unwrap();
        let mut args = vec!["scan", root, "--yes"];
        args.extend_from_slice(extra);
        self.ok(&args)
    }

    fn json(&self, args: &[&str]) -> (ExitCode, Value) {
        let (code, out) = self.ok(args);
        (code, serde_json::from_str(&out).unwrap())
    }
}

#[test]
fn test_scan_reports_overlapping_folders() {
    let fx = Fixture::new();
    let root = fx.root.to_str().unwrap();
    let (code, value) = fx.json(&["scan", root, "-o", "json"]);

    assert_eq!(code, ExitCode::Success);
    assert_eq!(value["summary"]["folders"], 2);
    assert_eq!(value["summary"]["exit_code"], 0);
    let candidates = value["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["permille"], 666);
    assert_eq!(
        candidates[0]["a"]["path"],
        fx.root.join("a").to_str().unwrap()
    );
    assert_eq!(candidates[0]["hit_bytes"], 3 * MIB);
}

#[test]
fn test_scan_text_summary() {
    let fx = Fixture::new();
    let (code, out) = fx.scan(&[]);

    assert_eq!(code, ExitCode::Success);
    assert!(out.contains(" 66%"), "{}", out);
    assert!(out.contains(fx.root.join("b").to_str().unwrap()));
    assert!(out.contains("1 candidate pair(s)"));
}

#[test]
fn test_scan_without_overlap_exits_no_dupes() {
    let fx = Fixture::new();
    fs::remove_dir_all(fx.root.join("b")).unwrap();

    let (code, out) = fx.scan(&[]);
    assert_eq!(code, ExitCode::NoDupes);
    assert!(out.contains("no dupes found"));
}

#[test]
fn test_second_scan_uses_cache_until_rescan() {
    let fx = Fixture::new();
    fx.scan(&[]);

    // A third copy appears after the first scan
    for (name, size) in [("one", MIB), ("two", 2 * MIB), ("three", 3 * MIB)] {
        sparse(&fx.root.join("c").join(name), size);
    }
    let root = fx.root.to_str().unwrap();

    let (_, cached) = fx.json(&["scan", root, "-o", "json"]);
    assert_eq!(cached["candidates"].as_array().unwrap().len(), 1);

    let (_, fresh) = fx.json(&["scan", root, "--rescan", "-o", "json"]);
    assert_eq!(fresh["summary"]["folders"], 3);
    assert_eq!(fresh["candidates"].as_array().unwrap().len(), 3);
}

#[test]
fn test_vanished_folder_is_pruned() {
    let fx = Fixture::new();
    fx.scan(&[]);
    fs::remove_dir_all(fx.root.join("b")).unwrap();

    let root = fx.root.to_str().unwrap();
    let (code, value) = fx.json(&["scan", root, "--yes", "-o", "json"]);
    assert_eq!(code, ExitCode::NoDupes);
    assert_eq!(
        value["summary"]["stale_folders"][0],
        fx.root.join("b").to_str().unwrap()
    );

    // The reduced set was saved
    let (result, _) = fx.run(&["tree"]);
    assert_eq!(result.unwrap(), ExitCode::NoDupes);
}

#[test]
fn test_distinct_prefix_filters_pairs() {
    let fx = Fixture::new();
    fx.scan(&[]);

    // `data/a` and `data/b` share everything up to the final byte
    let prefix = (fx.root.as_os_str().len() + 1).to_string();
    let (code, _) = fx.scan(&["--distinct-prefix", &prefix]);
    assert_eq!(code, ExitCode::NoDupes);
}

#[test]
fn test_tree_json_rows() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, value) = fx.json(&["tree", "-o", "json"]);
    assert_eq!(code, ExitCode::Success);
    let rows = value.as_array().unwrap();
    assert_eq!(rows[0]["depth"], 0);
    assert_eq!(rows[0]["path"], fx.root.to_str().unwrap());
    assert_eq!(rows[1]["name"], "a");
    assert_eq!(rows[1]["category"], "dupe");
}

#[test]
fn test_tree_text_lists_folders() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (_, out) = fx.ok(&["tree", "--extra-levels", "0"]);
    assert!(out.lines().any(|l| l.starts_with("  a ") && l.contains("dupe")));
    assert!(out.lines().any(|l| l.starts_with("  b ") && l.contains("dupe")));
}

#[test]
fn test_commands_need_a_dupe_set() {
    let fx = Fixture::new();
    let (result, _) = fx.run(&["tree"]);
    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("run `foldupe scan` first"));
}

#[test]
fn test_verify_pairs_identical_files() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, value) = fx.json(&["verify", "-o", "json"]);
    assert_eq!(code, ExitCode::Success);

    let view = &value[0];
    assert_eq!(view["index"], 0);
    assert_eq!(view["state"], "partial");
    assert_eq!(view["matched"][0][0], "one");
    assert_eq!(view["matched"][0][1], "uno");
    assert_eq!(view["matched"][1][0], "two");
    assert_eq!(view["matched"][1][1], "dos");
    assert_eq!(view["unmatched_keep"][0], "three");
    assert_eq!(view["unmatched_other"][0], "cuatro");

    // Digests were persisted for the next run
    assert!(fx.cache.join("hashes.log").exists());
}

#[test]
fn test_verify_rejects_unknown_index() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (result, _) = fx.run(&["verify", "--index", "5"]);
    assert!(result.is_err());
}

#[test]
fn test_compare_flags_matching_sizes() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, value) = fx.json(&["compare", "0", "-o", "json"]);
    assert_eq!(code, ExitCode::Success);
    let flags: Vec<bool> = value["a"]["matched"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_bool().unwrap())
        .collect();
    // Sorted by name: one, three, two
    assert_eq!(flags, vec![true, false, true]);
}

#[test]
fn test_compare_shows_hashes_from_earlier_verify() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (_, before) = fx.json(&["compare", "0", "-o", "json"]);
    assert_eq!(before["state"], "not_requested");

    fx.ok(&["verify"]);
    let (code, after) = fx.json(&["compare", "0", "-o", "json"]);
    assert_eq!(code, ExitCode::Success);
    assert_eq!(after["state"], "partial");
}

#[test]
fn test_collapse_rename() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, out) = fx.ok(&["collapse", "0", "--mode", "rename", "--yes"]);
    assert_eq!(code, ExitCode::Success);
    assert!(out.contains("Renamed 2 file(s)"));

    let b = fx.root.join("b");
    assert!(b.join("one").exists());
    assert!(b.join("two").exists());
    assert!(b.join("cuatro").exists());
    assert!(!b.join("uno").exists());
}

#[test]
fn test_collapse_delete_keep_b() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, _) = fx.ok(&[
        "collapse",
        "0",
        "--mode",
        "delete",
        "--keep",
        "b",
        "--permanent",
        "--yes",
    ]);
    assert_eq!(code, ExitCode::Success);

    let a = fx.root.join("a");
    assert!(!a.join("one").exists());
    assert!(!a.join("two").exists());
    assert!(a.join("three").exists());
    assert!(fx.root.join("b").join("uno").exists());
}

#[test]
fn test_collapse_delete_drops_emptied_folder() {
    let fx = Fixture::new();
    // Make b a full copy of a so every file verifies
    fs::remove_file(fx.root.join("b").join("cuatro")).unwrap();
    sparse(&fx.root.join("b").join("tres"), 3 * MIB);
    fx.scan(&[]);

    let (code, out) = fx.ok(&["collapse", "0", "--mode", "delete", "--permanent", "--yes"]);
    assert_eq!(code, ExitCode::Success);
    assert!(!fx.root.join("b").exists());
    assert!(out.contains("Dropped 1 candidate(s)"), "{}", out);

    let (result, _) = fx.run(&["tree"]);
    assert_eq!(result.unwrap(), ExitCode::NoDupes);
}

#[cfg(unix)]
#[test]
fn test_collapse_symlink() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, _) = fx.ok(&["collapse", "0", "--mode", "symlink", "--yes"]);
    assert_eq!(code, ExitCode::Success);

    let link = fx.root.join("b").join("uno");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), fx.root.join("a").join("one"));
}

#[test]
fn test_clear_cache_removes_files() {
    let fx = Fixture::new();
    fx.scan(&[]);

    let (code, out) = fx.ok(&["clear-cache"]);
    assert_eq!(code, ExitCode::Success);
    assert!(out.contains("Removed 2 cached file(s)"));

    let (result, _) = fx.run(&["tree"]);
    assert!(result.is_err());
}

#[test]
fn test_scan_without_roots_fails() {
    let fx = Fixture::new();
    let (result, _) = fx.run(&["scan"]);
    assert!(format!("{:#}", result.unwrap_err()).contains("no roots"));
}

#[test]
fn test_config_prints_effective_toml() {
    let fx = Fixture::new();
    let (code, out) = fx.ok(&["config"]);

    assert_eq!(code, ExitCode::Success);
    let parsed: toml::Value = toml::from_str(&out).unwrap();
    assert_eq!(parsed["extra_levels"].as_integer(), Some(1));
    assert_eq!(
        parsed["cache_dir"].as_str(),
        Some(fx.cache.to_str().unwrap())
    );
}
