//! Subcommand handlers.
//!
//! Results go to the writer given to [`App::new`] (stdout for the binary).
//! Status, scan problems and prompts go to stderr so JSON output stays clean.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::actions::{
    delete_files, rename_to_match, replace_with_symlinks, sync_mtimes, DeleteConfig,
};
use crate::cache::HashCache;
use crate::cli::{
    CollapseArgs, CollapseMode, Commands, CompareArgs, KeepSide, OutputFormat, ScanArgs, TreeArgs,
    VerifyArgs,
};
use crate::config::AppConfig;
use crate::duplicates::{prune_stale, CandidateScorer, DupeCandidate};
use crate::error::ExitCode;
use crate::hashing::{
    compare_folders, file_stats, stat_folder_files, FolderComparison, HashWorkerPool, VerifyState,
};
use crate::output::json::{
    write_json, JsonComparison, JsonScanOutput, JsonScanSummary, JsonSideBySide,
};
use crate::output::text;
use crate::progress::{HashObserver, Progress, ScanObserver};
use crate::scanner::{
    list_folder, DirectoryScanner, FolderRecord, FolderRef, ListingEntry, ScanReport,
};
use crate::snapshot::SnapshotStore;
use crate::tree::{rows, DupeTreeBuilder};

/// Width of each panel in the side-by-side view.
const PANEL_WIDTH: usize = 60;

/// Ask a yes/no question on stderr.
///
/// `assume_yes` answers without asking. Without a terminal on stdin the
/// answer is no.
fn confirm(question: &str, assume_yes: bool) -> io::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        log::warn!("{} Not a terminal, assuming no (pass --yes to accept)", question);
        return Ok(false);
    }
    eprint!("{} [y/N] ", question);
    io::stderr().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Application state shared by the subcommands.
pub struct App<'a> {
    config: AppConfig,
    store: SnapshotStore,
    shutdown: Arc<AtomicBool>,
    progress: Arc<Progress>,
    out: &'a mut dyn Write,
}

impl<'a> App<'a> {
    pub fn new(
        config: AppConfig,
        shutdown: Arc<AtomicBool>,
        quiet: bool,
        out: &'a mut dyn Write,
    ) -> Self {
        let store = SnapshotStore::new(config.cache_dir());
        Self {
            config,
            store,
            shutdown,
            progress: Arc::new(Progress::new(quiet)),
            out,
        }
    }

    /// Run one subcommand.
    ///
    /// # Errors
    ///
    /// Any failure that aborts the subcommand, including cancellation.
    pub fn run(&mut self, command: Commands) -> Result<ExitCode> {
        match command {
            Commands::Scan(args) => self.scan(args),
            Commands::Tree(args) => self.tree(args),
            Commands::Verify(args) => self.verify(args),
            Commands::Compare(args) => self.compare(args),
            Commands::Collapse(args) => self.collapse(args),
            Commands::ClearCache => self.clear_cache(),
            Commands::Config => {
                write!(self.out, "{}", self.config.to_toml()?)?;
                Ok(ExitCode::Success)
            }
        }
    }

    fn ensure_cache_dir(&self) -> Result<()> {
        fs::create_dir_all(self.store.dir()).with_context(|| {
            format!("failed to create cache directory {}", self.store.dir().display())
        })
    }

    fn load_dupes(&self) -> Result<Vec<DupeCandidate>> {
        match self.store.load_dupeset_or_discard() {
            Some(dupes) => Ok(dupes),
            None => bail!(
                "no cached dupe set in {}; run `foldupe scan` first",
                self.store.dir().display()
            ),
        }
    }

    fn candidate(dupes: &[DupeCandidate], index: usize) -> Result<&DupeCandidate> {
        dupes.get(index).with_context(|| {
            format!(
                "candidate {} does not exist ({} candidates)",
                index,
                dupes.len()
            )
        })
    }

    fn walk(&self, roots: &[PathBuf]) -> Result<ScanReport> {
        let observer: Arc<dyn ScanObserver> = self.progress.clone();
        let scanner = DirectoryScanner::new()
            .with_shutdown_flag(Arc::clone(&self.shutdown))
            .with_observer(observer)
            .with_progress_interval(self.config.scan_progress_interval());

        self.progress.start_walk();
        let report = scanner.scan_all(roots);
        let folders = report.as_ref().map_or(0, |r| r.folders.len());
        self.progress.finish_walk(folders);
        report.context("scan aborted")
    }

    fn scan(&mut self, args: ScanArgs) -> Result<ExitCode> {
        // A new pair filter invalidates the cached dupe set
        let rescore = args.distinct_prefix.is_some();
        if rescore {
            self.config.distinct_prefix = args.distinct_prefix;
        }
        let roots = if args.roots.is_empty() {
            self.config.roots.clone()
        } else {
            args.roots
        };
        self.ensure_cache_dir()?;
        if args.clear_cache {
            let removed = self.store.clear_all().context("failed to clear caches")?;
            log::info!("Cleared {} cached file(s)", removed);
        }

        let cached = if args.rescan {
            None
        } else {
            self.store.load_snapshot_or_discard()
        };

        let mut report = ScanReport::default();
        let (folders, cached_dupes) = match cached {
            Some(folders) => {
                log::info!("Loaded {} folders from snapshot", folders.len());
                let dupes = if rescore {
                    None
                } else {
                    self.store.load_dupeset_or_discard()
                };
                (folders, dupes)
            }
            None => {
                if roots.is_empty() {
                    bail!("no roots given and none configured");
                }
                report = self.walk(&roots)?;
                // Surface access problems before paying for scoring
                text::write_scan_problems(&mut io::stderr(), &report)?;
                self.store
                    .save_snapshot(&report.folders)
                    .context("failed to save snapshot")?;
                self.store.clear_dupeset()?;
                (std::mem::take(&mut report.folders), None)
            }
        };

        let dupes = match cached_dupes {
            Some(dupes) => {
                log::info!("Loaded {} candidates from dupe set", dupes.len());
                dupes
            }
            None => {
                log::info!("Scoring {} folders", folders.len());
                let scorer = CandidateScorer::new(self.config.score_config())
                    .with_shutdown_flag(Arc::clone(&self.shutdown));
                let dupes = scorer.score_all(&folders).context("scoring aborted")?;
                self.store
                    .save_dupeset(&dupes)
                    .context("failed to save dupe set")?;
                dupes
            }
        };

        let pruned = prune_stale(dupes);
        let mut declined = false;
        if pruned.is_shrunk() {
            let mut err = io::stderr();
            text::write_scan_problems(&mut err, &report)?;
            writeln!(
                err,
                "{} folder(s) no longer exist; {} candidate(s) remain",
                pruned.stale_folders.len(),
                pruned.kept.len()
            )?;
            for path in &pruned.stale_folders {
                writeln!(err, "  {}", path.display())?;
            }
            if confirm("Save the reduced dupe set?", args.yes)? {
                self.store
                    .save_dupeset(&pruned.kept)
                    .context("failed to save dupe set")?;
            } else {
                declined = true;
            }
        }

        let code = if pruned.kept.is_empty() {
            ExitCode::NoDupes
        } else if declined || report.has_errors() {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        };

        match args.output {
            OutputFormat::Text => {
                if pruned.kept.is_empty() {
                    writeln!(self.out, "no dupes found")?;
                } else {
                    text::write_summary(self.out, &pruned.kept)?;
                }
            }
            OutputFormat::Json => {
                let summary = JsonScanSummary {
                    folders: folders.len(),
                    errors: report.errors.iter().map(ToString::to_string).collect(),
                    skipped_mounts: report
                        .skipped_mounts
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect(),
                    stale_folders: pruned
                        .stale_folders
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect(),
                    ..Default::default()
                }
                .with_exit_code(code);
                write_json(self.out, &JsonScanOutput::new(&pruned.kept, summary), true)?;
            }
        }
        Ok(code)
    }

    fn tree(&mut self, args: TreeArgs) -> Result<ExitCode> {
        let pruned = prune_stale(self.load_dupes()?);
        for path in &pruned.stale_folders {
            log::warn!("Skipping vanished folder {}", path.display());
        }
        let extra = args.extra_levels.unwrap_or(self.config.extra_levels);
        let Some(root) = DupeTreeBuilder::new(extra).build(&pruned.kept) else {
            writeln!(self.out, "no dupes found")?;
            return Ok(ExitCode::NoDupes);
        };

        let rows = rows(&root);
        match args.output {
            OutputFormat::Text => text::write_tree(self.out, &rows)?,
            OutputFormat::Json => write_json(self.out, &rows, true)?,
        }
        Ok(ExitCode::Success)
    }

    fn hash_pool(&self) -> Result<HashWorkerPool> {
        self.ensure_cache_dir()?;
        let cache = HashCache::open_or_reset(&self.store.hash_log_path())
            .context("failed to open hash log")?;
        let observer: Arc<dyn HashObserver> = self.progress.clone();
        Ok(HashWorkerPool::new(
            Arc::new(cache),
            self.config.hasher().with_observer(observer),
        ))
    }

    /// Hash every folder of `selected` through one pool and wait for it.
    fn hash_folders<'d>(&self, selected: impl Iterator<Item = &'d DupeCandidate>) -> Result<()> {
        let pool = self.hash_pool()?;

        let mut seen: HashSet<*const FolderRecord> = HashSet::new();
        self.progress.start_hashing();
        for dupe in selected {
            for folder in dupe.folders() {
                if !seen.insert(Arc::as_ptr(folder)) {
                    continue;
                }
                match stat_folder_files(folder.path()) {
                    Ok(files) => {
                        if let Err(e) = pool.request(folder, files) {
                            log::warn!("Cannot hash {}: {}", folder.path().display(), e);
                        }
                    }
                    Err(e) => log::warn!("Cannot list {}: {}", folder.path().display(), e),
                }
            }
        }
        pool.terminate();
        self.progress.finish_hashing();

        let stats = pool.stats();
        log::info!(
            "Hashed {} file(s), {} from cache, {} failed",
            stats.files_hashed,
            stats.cache_hits,
            stats.failures
        );
        Ok(())
    }

    fn verify(&mut self, args: VerifyArgs) -> Result<ExitCode> {
        let dupes = self.load_dupes()?;
        let indices: Vec<usize> = if args.indices.is_empty() {
            (0..args.limit.unwrap_or(dupes.len()).min(dupes.len())).collect()
        } else {
            for &i in &args.indices {
                Self::candidate(&dupes, i)?;
            }
            args.indices
        };
        if indices.is_empty() {
            writeln!(self.out, "nothing to verify")?;
            return Ok(ExitCode::NoDupes);
        }

        self.hash_folders(indices.iter().map(|&i| &dupes[i]))?;

        let mut all_clean = true;
        let mut views = Vec::new();
        for &i in &indices {
            let dupe = &dupes[i];
            let cmp = compare_folders(&dupe.a, &dupe.b);
            all_clean &= cmp.failed == 0;
            match args.output {
                OutputFormat::Text => {
                    text::write_comparison(self.out, i, dupe.a.path(), dupe.b.path(), &cmp)?;
                }
                OutputFormat::Json => {
                    views.push(JsonComparison::new(i, dupe.a.path(), dupe.b.path(), &cmp));
                }
            }
        }
        if args.output == OutputFormat::Json {
            write_json(self.out, &views, true)?;
        }

        Ok(if all_clean {
            ExitCode::Success
        } else {
            ExitCode::PartialSuccess
        })
    }

    fn compare(&mut self, args: CompareArgs) -> Result<ExitCode> {
        let dupes = self.load_dupes()?;
        let dupe = Self::candidate(&dupes, args.index)?;
        let (a, b) = (dupe.a.path(), dupe.b.path());
        let left = list_folder(a).with_context(|| format!("cannot list {}", a.display()))?;
        let right = list_folder(b).with_context(|| format!("cannot list {}", b.display()))?;
        let state = self.cached_state(dupe, &left, &right);

        match args.output {
            OutputFormat::Text => {
                let label = format!("{:3}%", text::percent(dupe.score));
                writeln!(
                    self.out,
                    "{} / {}  {}  {}",
                    args.index,
                    dupes.len(),
                    yansi::Paint::paint(&label, text::score_style(dupe.score)),
                    text::state_label(state)
                )?;
                text::write_side_by_side(self.out, a, &left, b, &right, PANEL_WIDTH)?;
            }
            OutputFormat::Json => {
                let view = JsonSideBySide::new(args.index, state, a, left, b, right);
                write_json(self.out, &view, true)?;
            }
        }
        Ok(ExitCode::Success)
    }

    /// Verification state of a candidate from hashes earlier runs left in the log.
    ///
    /// Nothing is hashed; files without a valid cached hash count as not requested.
    fn cached_state(
        &self,
        dupe: &DupeCandidate,
        left: &[ListingEntry],
        right: &[ListingEntry],
    ) -> VerifyState {
        let pool = match self.hash_pool() {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("Not showing cached hashes: {:#}", e);
                return VerifyState::NotRequested;
            }
        };
        let attached = pool.attach_cached(&dupe.a, &file_stats(left))
            + pool.attach_cached(&dupe.b, &file_stats(right));
        log::debug!("Attached {} cached hash(es)", attached);
        compare_folders(&dupe.a, &dupe.b).state()
    }

    fn collapse(&mut self, args: CollapseArgs) -> Result<ExitCode> {
        let dupes = self.load_dupes()?;
        let dupe = Self::candidate(&dupes, args.index)?;
        let (keep, other): (&FolderRef, &FolderRef) = match args.keep {
            KeepSide::A => (&dupe.a, &dupe.b),
            KeepSide::B => (&dupe.b, &dupe.a),
        };

        self.hash_folders(std::iter::once(dupe))?;
        let cmp = compare_folders(keep, other);
        text::write_comparison(&mut io::stderr(), args.index, keep.path(), other.path(), &cmp)?;
        if cmp.matched.is_empty() {
            bail!(
                "no verified files between {} and {}",
                keep.path().display(),
                other.path().display()
            );
        }

        let question = format!(
            "{} {} verified file(s) in {}?",
            mode_verb(args.mode),
            cmp.matched.len(),
            other.path().display()
        );
        if !confirm(&question, args.yes)? {
            writeln!(self.out, "aborted")?;
            return Ok(ExitCode::PartialSuccess);
        }

        let code = self.apply(&args, &dupes, keep, other, &cmp)?;
        Ok(code)
    }

    fn apply(
        &mut self,
        args: &CollapseArgs,
        dupes: &[DupeCandidate],
        keep: &FolderRef,
        other: &FolderRef,
        cmp: &FolderComparison,
    ) -> Result<ExitCode> {
        let (keep_dir, other_dir) = (keep.path(), other.path());
        match args.mode {
            CollapseMode::Delete => {
                let paths: Vec<PathBuf> =
                    cmp.matched.iter().map(|(_, o)| other_dir.join(o)).collect();
                let config = DeleteConfig {
                    permanent: args.permanent,
                };
                let result = delete_files(&paths, &config);
                writeln!(self.out, "{}", result.summary())?;
                for (path, reason) in &result.failures {
                    writeln!(self.out, "  failed {}: {}", path.display(), reason)?;
                }
                let mut declined = false;
                if result.removed_dirs.iter().any(|d| d == other_dir) {
                    let dropped = dupes.iter().filter(|d| d.references(other)).count();
                    let question = format!(
                        "{} is gone; drop its {} candidate(s) from the saved dupe set?",
                        other_dir.display(),
                        dropped
                    );
                    if confirm(&question, args.yes)? {
                        let pruned = prune_stale(dupes.to_vec());
                        self.store
                            .save_dupeset(&pruned.kept)
                            .context("failed to save dupe set")?;
                        writeln!(
                            self.out,
                            "Dropped {} candidate(s) referencing {}",
                            dropped,
                            other_dir.display()
                        )?;
                    } else {
                        declined = true;
                    }
                }
                return Ok(if result.all_succeeded() && !declined {
                    ExitCode::Success
                } else {
                    ExitCode::PartialSuccess
                });
            }
            CollapseMode::Symlink => {
                let (kept, nuked): (Vec<OsString>, Vec<OsString>) =
                    cmp.matched.iter().cloned().unzip();
                let replaced = replace_with_symlinks(keep_dir, &kept, other_dir, &nuked)?;
                writeln!(self.out, "Replaced {} file(s) with symlinks", replaced.len())?;
            }
            CollapseMode::SyncMtime => {
                let pairs: Vec<(PathBuf, PathBuf)> = cmp
                    .matched
                    .iter()
                    .map(|(k, o)| (keep_dir.join(k), other_dir.join(o)))
                    .collect();
                let synced = sync_mtimes(&pairs)?;
                writeln!(self.out, "Synced modification times of {} file(s)", synced)?;
            }
            CollapseMode::Rename => {
                let pairs: Vec<(PathBuf, PathBuf)> = cmp
                    .matched
                    .iter()
                    .filter(|(k, o)| k != o)
                    .map(|(k, o)| (other_dir.join(o), other_dir.join(k)))
                    .collect();
                let renamed = rename_to_match(&pairs)?;
                writeln!(self.out, "Renamed {} file(s)", renamed)?;
            }
        }
        Ok(ExitCode::Success)
    }

    fn clear_cache(&mut self) -> Result<ExitCode> {
        let removed = self.store.clear_all().context("failed to clear caches")?;
        writeln!(
            self.out,
            "Removed {} cached file(s) from {}",
            removed,
            self.store.dir().display()
        )?;
        Ok(ExitCode::Success)
    }
}

fn mode_verb(mode: CollapseMode) -> &'static str {
    match mode {
        CollapseMode::Delete => "Delete",
        CollapseMode::Symlink => "Replace with symlinks",
        CollapseMode::SyncMtime => "Sync modification times of",
        CollapseMode::Rename => "Rename",
    }
}
