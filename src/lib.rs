//! foldupe - find folders that hold the same content
//!
//! Folders are compared by the multiset of their file sizes. Strong pairs
//! are cached, browsable as a score-annotated tree, verifiable by content
//! hash, and can be collapsed by deletion, symlinking, timestamp sync or
//! renaming.
//!
//! # Pipeline
//!
//! ```text
//! roots -> DirectoryScanner -> FolderRecords -> SnapshotStore
//!       -> CandidateScorer -> DupeCandidates -> SnapshotStore
//!       -> HashWorkerPool (on demand) -> HashCache
//!       -> DupeTreeBuilder
//! ```

pub mod actions;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod snapshot;
pub mod tree;

use std::io::{self, IsTerminal, Write};

use anyhow::Result;

use crate::app::App;
use crate::cli::Cli;
use crate::config::AppConfig;
use crate::error::ExitCode;

/// Run the CLI with stdout as the result sink.
///
/// # Errors
///
/// Returns the error that aborted the subcommand. Use
/// [`ExitCode::for_error`] to pick the process exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let stdout = io::stdout();
    let colors = !cli.no_color && stdout.is_terminal();
    let mut out = stdout.lock();
    let code = run_app_with(cli, &mut out, colors)?;
    out.flush()?;
    Ok(code)
}

/// Run the CLI writing results to `out`.
///
/// # Errors
///
/// Returns the error that aborted the subcommand.
pub fn run_app_with(cli: Cli, out: &mut dyn Write, colors: bool) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if !colors {
        yansi::disable();
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }
    log::debug!("Effective configuration: {:?}", config);

    let shutdown = signal::install_handler();
    let mut app = App::new(config, shutdown, cli.quiet, out);
    app.run(cli.command)
}
