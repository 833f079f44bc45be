//! Retention score calculators.
//!
//! A calculator maps a peptide sequence to a dimensionless retention score
//! (iRT, hydrophobicity ...). The regression engine treats them as
//! interchangeable candidates and keeps whichever correlates best with the
//! observed times.

mod library;
mod project;

pub use library::LibraryCalculator;
pub use project::ProjectCalculator;

use crate::errors::IncompleteStandardsError;
use serde::{
    Deserialize,
    Serialize,
};

/// Capability set every score calculator provides.
pub trait RetentionScoreCalculator {
    fn name(&self) -> &str;

    /// Score for `sequence`, `None` if this calculator does not know it.
    fn score(&self, sequence: &str) -> Option<f64>;

    /// Sentinel for unscorable peptides. Always strictly below every real score.
    fn unknown_score(&self) -> f64;

    /// Unusable calculators are skipped during candidate selection.
    fn is_usable(&self) -> bool {
        true
    }

    /// Picks the subset of `candidates` to anchor a regression on.
    fn choose_regression_peptides<'a>(
        &self,
        candidates: &[&'a str],
    ) -> Result<Vec<&'a str>, IncompleteStandardsError>;

    /// The subset of `candidates` that are standards of this calculator.
    fn standard_peptides<'a>(&self, candidates: &[&'a str]) -> Vec<&'a str>;
}

/// How many standards must be present before a regression can be trusted.
///
/// Small standard sets need every member; larger ones tolerate a fraction
/// missing, but never drop below `min_count`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardCountRule {
    pub min_count: usize,
    pub min_fraction: f64,
}

impl Default for StandardCountRule {
    fn default() -> Self {
        Self {
            min_count: 8,
            min_fraction: 0.80,
        }
    }
}

impl StandardCountRule {
    pub fn required(&self, expected_count: usize) -> usize {
        if expected_count <= self.min_count {
            return expected_count;
        }
        let fraction = (expected_count as f64 * self.min_fraction).ceil() as usize;
        self.min_count.max(fraction)
    }

    pub fn is_acceptable(&self, found: usize, expected_count: usize) -> bool {
        found >= self.required(expected_count)
    }
}

/// Keeps the first occurrence of each sequence, preserving order.
pub(crate) fn dedup_sequences<'a>(candidates: &[&'a str]) -> Vec<&'a str> {
    let mut seen = std::collections::HashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .copied()
        .filter(|seq| seen.insert(*seq))
        .collect()
}
