//! Command-line interface definitions for foldupe.
//!
//! Global options (verbosity, color, config, cache location) apply to every
//! subcommand.
//!
//! ```bash
//! # Scan two backup drives, comparing only across them
//! foldupe scan /mnt/d01 /mnt/d02 --distinct-prefix 8
//!
//! # Browse the result as a tree
//! foldupe tree --extra-levels 2
//!
//! # Hash both sides of the first three candidates
//! foldupe verify --limit 3
//!
//! # Replace the second folder of candidate 0 with symlinks
//! foldupe collapse 0 --mode symlink --keep a
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Find folders that hold the same content.
///
/// Folders are compared by the sizes of the files they contain; strong
/// candidates can then be verified by content hash and collapsed.
#[derive(Debug, Parser)]
#[command(name = "foldupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for the snapshot, dupe set and hash log
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan roots and score folder pairs
    Scan(ScanArgs),
    /// Show the cached dupe set as a directory tree
    Tree(TreeArgs),
    /// Hash both folders of candidates and compare them
    Verify(VerifyArgs),
    /// Show both folders of a candidate side by side
    Compare(CompareArgs),
    /// Verify a candidate, then delete, link, sync or rename one side
    Collapse(CollapseArgs),
    /// Remove the snapshot, dupe set and hash log
    ClearCache,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Roots to scan (defaults to `roots` from the configuration)
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,

    /// Remove every cached file before scanning
    #[arg(long)]
    pub clear_cache: bool,

    /// Ignore the cached raw snapshot and walk the roots again
    #[arg(long)]
    pub rescan: bool,

    /// Compare only folders whose paths differ within the first N bytes
    #[arg(long, value_name = "N")]
    pub distinct_prefix: Option<usize>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Accept a shrunken dupe set without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Sibling levels expanded around each dupe path
    #[arg(long, value_name = "N")]
    pub extra_levels: Option<usize>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Candidate index to verify (repeatable)
    #[arg(long = "index", value_name = "I")]
    pub indices: Vec<usize>,

    /// Verify the first N candidates when no index is given
    #[arg(long, value_name = "N", conflicts_with = "indices")]
    pub limit: Option<usize>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Candidate index
    #[arg(value_name = "INDEX")]
    pub index: usize,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CollapseArgs {
    /// Candidate index
    #[arg(value_name = "INDEX")]
    pub index: usize,

    /// What to do with the verified files of the other folder
    #[arg(long, value_enum)]
    pub mode: CollapseMode,

    /// Which folder of the pair is kept intact
    #[arg(long, value_enum, default_value = "a")]
    pub keep: KeepSide,

    /// Delete permanently instead of moving to trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long)]
    pub permanent: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored when writing to a terminal
    Text,
    /// JSON for scripting
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollapseMode {
    /// Delete the verified duplicates, then the folder if left empty
    Delete,
    /// Replace the verified duplicates with symlinks to the kept files
    Symlink,
    /// Copy modification times from the kept files
    SyncMtime,
    /// Rename the duplicates to their kept twin's name
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepSide {
    /// The first folder of the candidate
    A,
    /// The second folder of the candidate
    B,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
