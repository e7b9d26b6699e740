//! Application configuration.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, else `<platform config dir>/config.toml`)
//! 3. `FOLDUPE_*` environment variables, `__` separating nested keys
//!    (e.g. `FOLDUPE_SCORING__MIN_SCORE=0.3`)
//! 4. CLI flags, applied by the caller
//!
//! ```toml
//! roots = ["/mnt/d01", "/mnt/d02"]
//! extra_levels = 2
//! distinct_prefix = 8
//!
//! [scoring]
//! min_score = 0.25
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::scorer::{
    DEFAULT_FAST_ACCEPT_BYTES, DEFAULT_MIN_HIT_FRACTION, DEFAULT_MIN_SCORE, DEFAULT_MIN_SIZE_RATIO,
};
use crate::duplicates::{PairFilter, ScoreConfig};
use crate::hashing::hasher::{DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL};
use crate::hashing::Hasher;
use crate::tree::DEFAULT_EXTRA_LEVELS;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FOLDUPE_";

/// Scoring thresholds, see [`ScoreConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub min_score: f64,
    pub min_size_ratio: f64,
    pub min_hit_fraction: f64,
    pub fast_accept_bytes: u64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            min_size_ratio: DEFAULT_MIN_SIZE_RATIO,
            min_hit_fraction: DEFAULT_MIN_HIT_FRACTION,
            fast_accept_bytes: DEFAULT_FAST_ACCEPT_BYTES,
        }
    }
}

/// Hashing parameters, see [`Hasher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSection {
    pub chunk_size: usize,
    pub progress_interval: u64,
}

impl Default for HashingSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Roots scanned when none are given on the command line.
    pub roots: Vec<PathBuf>,
    /// Directory holding the snapshot, dupe set and hash log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub extra_levels: usize,
    /// Compare only folders whose paths differ within this many bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_prefix: Option<usize>,
    pub scan_progress_ms: u64,
    pub scoring: ScoringSection,
    pub hashing: HashingSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            cache_dir: None,
            extra_levels: DEFAULT_EXTRA_LEVELS,
            distinct_prefix: None,
            scan_progress_ms: 50,
            scoring: ScoringSection::default(),
            hashing: HashingSection::default(),
        }
    }
}

impl AppConfig {
    /// Platform config file location, if a home directory is known.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "foldupe", "foldupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, then the TOML file, then the environment.
    ///
    /// An explicit `path` must exist; the platform default is optional.
    ///
    /// # Errors
    ///
    /// Fails if an explicit file is missing.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(default) = Self::default_path().filter(|p| p.is_file()) {
                    log::debug!("Using config file {}", default.display());
                    figment = figment.merge(Toml::file(default));
                }
            }
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load the layered configuration.
    ///
    /// # Errors
    ///
    /// Fails on a missing explicit file or on values of the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::figment(path)?
            .extract()
            .context("invalid configuration")
    }

    /// Where the persisted state lives.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("foldupe"))
    }

    #[must_use]
    pub fn scan_progress_interval(&self) -> Duration {
        Duration::from_millis(self.scan_progress_ms)
    }

    /// Scorer thresholds, including the cross-root pair filter if set.
    #[must_use]
    pub fn score_config(&self) -> ScoreConfig {
        let filter = match self.distinct_prefix {
            Some(len) => PairFilter::DistinctPrefix(len),
            None => PairFilter::All,
        };
        ScoreConfig {
            min_score: self.scoring.min_score,
            min_size_ratio: self.scoring.min_size_ratio,
            min_hit_fraction: self.scoring.min_hit_fraction,
            fast_accept_bytes: self.scoring.fast_accept_bytes,
            pair_filter: filter,
        }
    }

    #[must_use]
    pub fn hasher(&self) -> Hasher {
        Hasher::new()
            .with_chunk_size(self.hashing.chunk_size)
            .with_progress_interval(self.hashing.progress_interval)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}
