use crate::calculators::RetentionScoreCalculator;
use std::collections::HashMap;
use tracing::debug;

/// Memoized calculator scores, keyed by calculator name then sequence.
///
/// One cache belongs to one top level regression call. Independent regressions
/// running in parallel each need their own instance.
#[derive(Debug, Clone, Default)]
pub struct ScoreCache {
    scores: HashMap<String, HashMap<String, f64>>,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores every peptide against every usable calculator up front.
    ///
    /// Values already present in `previous` are carried over instead of
    /// being recomputed.
    pub fn with_peptides(
        calculators: &[&dyn RetentionScoreCalculator],
        peptides: &[&str],
        previous: Option<&ScoreCache>,
    ) -> Self {
        let mut cache = Self::new();
        let mut carried = 0usize;
        for calc in calculators.iter().filter(|c| c.is_usable()) {
            let old = previous.and_then(|p| p.scores.get(calc.name()));
            let entry = cache.scores.entry(calc.name().to_string()).or_default();
            for seq in peptides {
                if entry.contains_key(*seq) {
                    continue;
                }
                let score = match old.and_then(|o| o.get(*seq)) {
                    Some(score) => {
                        carried += 1;
                        *score
                    }
                    None => calc.score(seq).unwrap_or(calc.unknown_score()),
                };
                entry.insert(seq.to_string(), score);
            }
        }
        debug!(
            "Built score cache with {} entries ({} carried over)",
            cache.len(),
            carried
        );
        cache
    }

    /// Cached score, computing and storing it on a miss.
    ///
    /// Unscorable sequences are stored as the calculator's unknown score.
    pub fn score(&mut self, calculator: &dyn RetentionScoreCalculator, sequence: &str) -> f64 {
        let entry = self
            .scores
            .entry(calculator.name().to_string())
            .or_default();
        if let Some(score) = entry.get(sequence) {
            return *score;
        }
        let score = calculator
            .score(sequence)
            .unwrap_or(calculator.unknown_score());
        entry.insert(sequence.to_string(), score);
        score
    }

    /// Cached score without computing anything.
    pub fn get(&self, calculator_name: &str, sequence: &str) -> Option<f64> {
        self.scores
            .get(calculator_name)
            .and_then(|entry| entry.get(sequence))
            .copied()
    }

    /// Recomputes every stored score for one calculator.
    pub fn recalculate(&mut self, calculator: &dyn RetentionScoreCalculator) {
        if let Some(entry) = self.scores.get_mut(calculator.name()) {
            for (seq, score) in entry.iter_mut() {
                *score = calculator
                    .score(seq)
                    .unwrap_or(calculator.unknown_score());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.scores.values().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
