//! Pairwise folder scoring.
//!
//! # Overview
//!
//! Two folders are compared by the multiset of their file sizes. Each size on
//! the left side can consume one equal size on the right side, so three 10 MB
//! files match at most three 10 MB files on the other side. The score is
//! `2 * hits / (files(a) + files(b))`.
//!
//! A pair becomes a [`DupeCandidate`] when the matched bytes alone reach the
//! fast-accept threshold, or when all of these hold:
//! - the score reaches `min_score`
//! - the smaller total is at least `min_size_ratio` of the larger
//! - matched bytes are at least `min_hit_fraction` of either side's total
//!
//! # Performance
//!
//! Every unordered pair is visited, which is O(n²) in the folder count. Rows of
//! the pair matrix are scored in parallel with rayon and reassembled in row
//! order, so the output order is the same as a sequential `i < j` sweep.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::ScoreError;
use crate::scanner::{FolderRecord, FolderRef, MIB};

/// Default minimum score.
pub const DEFAULT_MIN_SCORE: f64 = 0.20;
/// Default minimum ratio between the smaller and larger folder total.
pub const DEFAULT_MIN_SIZE_RATIO: f64 = 0.70;
/// Default minimum fraction of either side's bytes that must be matched.
pub const DEFAULT_MIN_HIT_FRACTION: f64 = 0.20;
/// Default matched-byte count that accepts a pair outright.
pub const DEFAULT_FAST_ACCEPT_BYTES: u64 = 600 * MIB;

/// Absorbs float error when truncating to permille.
const PERMILLE_EPSILON: f64 = 1e-6;

/// Predicate restricting which folder pairs are compared at all.
#[derive(Clone, Default)]
pub enum PairFilter {
    /// Compare every pair.
    #[default]
    All,
    /// Compare only pairs whose paths differ within the first N bytes.
    ///
    /// Used to compare only across storage roots mounted under distinct
    /// prefixes, e.g. `/mnt/d01/` versus `/mnt/d02/`.
    DistinctPrefix(usize),
    /// Arbitrary caller-supplied predicate.
    Custom(Arc<dyn Fn(&FolderRecord, &FolderRecord) -> bool + Send + Sync>),
}

impl fmt::Debug for PairFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::DistinctPrefix(n) => write!(f, "DistinctPrefix({})", n),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PairFilter {
    /// Whether the pair should be scored.
    #[must_use]
    pub fn allows(&self, a: &FolderRecord, b: &FolderRecord) -> bool {
        match self {
            Self::All => true,
            Self::DistinctPrefix(len) => {
                let a = a.path().as_os_str().as_encoded_bytes();
                let b = b.path().as_os_str().as_encoded_bytes();
                a[..a.len().min(*len)] != b[..b.len().min(*len)]
            }
            Self::Custom(predicate) => predicate(a, b),
        }
    }
}

/// Thresholds and policy for [`CandidateScorer`].
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub min_score: f64,
    pub min_size_ratio: f64,
    pub min_hit_fraction: f64,
    pub fast_accept_bytes: u64,
    pub pair_filter: PairFilter,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            min_size_ratio: DEFAULT_MIN_SIZE_RATIO,
            min_hit_fraction: DEFAULT_MIN_HIT_FRACTION,
            fast_accept_bytes: DEFAULT_FAST_ACCEPT_BYTES,
            pair_filter: PairFilter::All,
        }
    }
}

impl ScoreConfig {
    /// Set the pair filter.
    #[must_use]
    pub fn with_pair_filter(mut self, filter: PairFilter) -> Self {
        self.pair_filter = filter;
        self
    }
}

/// Matched files between two folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overlap {
    /// Number of matched sizes.
    pub hits: usize,
    /// Sum of the matched sizes.
    pub hit_bytes: u64,
}

/// Multiset intersection of two folders' file sizes.
#[must_use]
pub fn overlap(a: &FolderRecord, b: &FolderRecord) -> Overlap {
    let mut remaining: HashMap<u64, usize> = HashMap::with_capacity(b.file_count());
    for &size in b.files() {
        *remaining.entry(size).or_default() += 1;
    }

    let mut result = Overlap::default();
    for &size in a.files() {
        if let Some(count) = remaining.get_mut(&size) {
            if *count > 0 {
                *count -= 1;
                result.hits += 1;
                result.hit_bytes += size;
            }
        }
    }
    result
}

/// Score of a pair given its overlap.
fn score_of(a: &FolderRecord, b: &FolderRecord, hits: usize) -> f64 {
    let total = a.file_count() + b.file_count();
    if total == 0 {
        return 0.0;
    }
    2.0 * hits as f64 / total as f64
}

/// Similarity score in `[0, 1]`, without any gating.
#[must_use]
pub fn similarity(a: &FolderRecord, b: &FolderRecord) -> f64 {
    score_of(a, b, overlap(a, b).hits)
}

/// A scored pair of folders.
///
/// `a` precedes `b` in the scan order the pair was generated from.
#[derive(Debug, Clone)]
pub struct DupeCandidate {
    pub score: f64,
    pub a: FolderRef,
    pub b: FolderRef,
}

impl DupeCandidate {
    #[must_use]
    pub fn new(score: f64, a: FolderRef, b: FolderRef) -> Self {
        Self { score, a, b }
    }

    /// Overlap of the two folders.
    #[must_use]
    pub fn overlap(&self) -> Overlap {
        overlap(&self.a, &self.b)
    }

    /// Score as truncated permille, the persisted representation.
    ///
    /// A score decoded from permille `p` yields `p` again.
    #[must_use]
    pub fn permille(&self) -> u32 {
        (self.score.clamp(0.0, 1.0) * 1000.0 + PERMILLE_EPSILON) as u32
    }

    /// Both folders, `a` first.
    #[must_use]
    pub fn folders(&self) -> [&FolderRef; 2] {
        [&self.a, &self.b]
    }

    /// Whether the candidate references this exact folder instance.
    #[must_use]
    pub fn references(&self, folder: &FolderRef) -> bool {
        Arc::ptr_eq(&self.a, folder) || Arc::ptr_eq(&self.b, folder)
    }
}

/// Scores every pair of a folder list.
#[derive(Debug, Clone, Default)]
pub struct CandidateScorer {
    config: ScoreConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl CandidateScorer {
    #[must_use]
    pub fn new(config: ScoreConfig) -> Self {
        Self {
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Scoring thresholds in use.
    #[must_use]
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Score a single pair, returning the score if it passes the gates.
    ///
    /// The pair filter is not consulted here.
    #[must_use]
    pub fn evaluate(&self, a: &FolderRecord, b: &FolderRecord) -> Option<f64> {
        let Overlap { hits, hit_bytes } = overlap(a, b);
        if hits == 0 {
            return None;
        }
        let score = score_of(a, b, hits);

        if hit_bytes >= self.config.fast_accept_bytes {
            return Some(score);
        }
        if score < self.config.min_score {
            return None;
        }

        let (total_a, total_b) = (a.total_size(), b.total_size());
        let larger = total_a.max(total_b);
        let ratio = if larger == 0 {
            0.0
        } else {
            total_a.min(total_b) as f64 / larger as f64
        };
        if ratio < self.config.min_size_ratio {
            return None;
        }

        let hit_bytes = hit_bytes as f64;
        let fraction = self.config.min_hit_fraction;
        if hit_bytes >= fraction * total_a as f64 || hit_bytes >= fraction * total_b as f64 {
            Some(score)
        } else {
            None
        }
    }

    /// Score every pair `(i, j)` with `i < j`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::Interrupted`] if the shutdown flag is raised.
    pub fn score_all(&self, folders: &[FolderRef]) -> Result<Vec<DupeCandidate>, ScoreError> {
        let n = folders.len();
        log::info!(
            "Scoring {} folders ({} pairs)",
            n,
            n.saturating_mul(n.saturating_sub(1)) / 2
        );

        let rows: Option<Vec<Vec<DupeCandidate>>> = (0..n)
            .into_par_iter()
            .map(|i| {
                if self.is_shutdown_requested() {
                    return None;
                }
                let a = &folders[i];
                let row = folders[i + 1..]
                    .iter()
                    .filter(|b| self.config.pair_filter.allows(a, b))
                    .filter_map(|b| {
                        self.evaluate(a, b)
                            .map(|score| DupeCandidate::new(score, Arc::clone(a), Arc::clone(b)))
                    })
                    .collect();
                Some(row)
            })
            .collect();

        let Some(rows) = rows else {
            log::info!("Scoring interrupted by shutdown signal");
            return Err(ScoreError::Interrupted);
        };

        let candidates: Vec<DupeCandidate> = rows.into_iter().flatten().collect();
        log::info!("Found {} candidate pairs", candidates.len());
        Ok(candidates)
    }
}
