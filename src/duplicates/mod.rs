//! Duplicate folder detection.
//!
//! This module provides functionality for:
//! - Pairwise folder scoring by file-size multiset overlap ([`scorer`])
//! - Dropping candidates whose folders vanished since the scan ([`stale`])

pub mod scorer;
pub mod stale;

// Re-export main types
pub use scorer::{
    overlap, similarity, CandidateScorer, DupeCandidate, Overlap, PairFilter, ScoreConfig,
};
pub use stale::{prune_stale, StaleReport};

/// Errors that can occur while scoring folder pairs.
#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    /// The scoring pass was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scoring interrupted by user")]
    Interrupted,
}
