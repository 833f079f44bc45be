use super::{
    RetentionScoreCalculator,
    StandardCountRule,
    dedup_sequences,
};
use crate::errors::IncompleteStandardsError;
use crate::models::ReferencePeptide;
use std::collections::HashMap;

/// Scores peptides by looking them up in a fixed table of standards with
/// known reference (iRT) values.
#[derive(Debug, Clone)]
pub struct LibraryCalculator {
    name: String,
    standards: Vec<ReferencePeptide>,
    lookup: HashMap<String, f64>,
    count_rule: StandardCountRule,
    unknown_score: f64,
}

impl LibraryCalculator {
    /// Repeated sequences keep their first score.
    pub fn new(name: impl Into<String>, standards: Vec<ReferencePeptide>) -> Self {
        let mut lookup = HashMap::with_capacity(standards.len());
        for pep in standards.iter() {
            lookup.entry(pep.sequence.clone()).or_insert(pep.score);
        }
        let unknown_score = below_range(lookup.values().copied());
        Self {
            name: name.into(),
            standards,
            lookup,
            count_rule: StandardCountRule::default(),
            unknown_score,
        }
    }

    pub fn with_count_rule(mut self, count_rule: StandardCountRule) -> Self {
        self.count_rule = count_rule;
        self
    }

    pub fn standards(&self) -> &[ReferencePeptide] {
        &self.standards
    }

    /// Number of distinct standard sequences.
    pub fn expected_count(&self) -> usize {
        self.lookup.len()
    }
}

/// A value strictly below every score in `scores`, a full range below the minimum.
fn below_range(scores: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = scores
        .filter(|s| s.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s), hi.max(s))
        });
    if !min.is_finite() {
        return 0.0;
    }
    min - (max - min).max(1.0)
}

impl RetentionScoreCalculator for LibraryCalculator {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, sequence: &str) -> Option<f64> {
        self.lookup.get(sequence).copied()
    }

    fn unknown_score(&self) -> f64 {
        self.unknown_score
    }

    fn is_usable(&self) -> bool {
        self.lookup.len() >= 2
    }

    fn choose_regression_peptides<'a>(
        &self,
        candidates: &[&'a str],
    ) -> Result<Vec<&'a str>, IncompleteStandardsError> {
        let found = self.standard_peptides(candidates);
        let required = self.count_rule.required(self.expected_count());
        if found.len() < required {
            return Err(IncompleteStandardsError {
                calculator: self.name.clone(),
                found: found.len(),
                required,
            });
        }
        Ok(found)
    }

    fn standard_peptides<'a>(&self, candidates: &[&'a str]) -> Vec<&'a str> {
        dedup_sequences(candidates)
            .into_iter()
            .filter(|seq| self.lookup.contains_key(*seq))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator(n: usize) -> LibraryCalculator {
        let standards = (0..n)
            .map(|i| ReferencePeptide::new(format!("STD{}K", i), i as f64 * 5.0 - 10.0))
            .collect();
        LibraryCalculator::new("iRT-C18", standards)
    }

    #[test]
    fn test_scores_from_table() {
        let calc = calculator(10);
        assert_eq!(calc.score("STD0K"), Some(-10.0));
        assert_eq!(calc.score("STD3K"), Some(5.0));
        assert_eq!(calc.score("NOTASTANDARD"), None);
        assert!(calc.is_usable());
    }

    #[test]
    fn test_unknown_score_below_all() {
        let calc = calculator(10);
        assert!(calc.standards().iter().all(|s| calc.unknown_score() < s.score));
        let single = LibraryCalculator::new("one", vec![ReferencePeptide::new("A", 3.0)]);
        assert!(single.unknown_score() < 3.0);
        assert!(!single.is_usable());
    }

    #[test]
    fn test_choose_regression_peptides_filters() {
        let calc = calculator(10);
        let mut candidates: Vec<String> = (0..10).map(|i| format!("STD{}K", i)).collect();
        candidates.push("OTHERPEPTIDE".to_string());
        candidates.push("STD1K".to_string());
        let refs: Vec<&str> = candidates.iter().map(|s| s.as_str()).collect();
        let chosen = calc.choose_regression_peptides(&refs).unwrap();
        assert_eq!(chosen.len(), 10);
        assert!(!chosen.contains(&"OTHERPEPTIDE"));
    }

    #[test]
    fn test_choose_regression_peptides_tolerates_missing() {
        // 10 standards need 8
        let calc = calculator(10);
        let candidates: Vec<String> = (0..8).map(|i| format!("STD{}K", i)).collect();
        let refs: Vec<&str> = candidates.iter().map(|s| s.as_str()).collect();
        assert_eq!(calc.choose_regression_peptides(&refs).unwrap().len(), 8);

        let err = calc.choose_regression_peptides(&refs[..7]).unwrap_err();
        assert_eq!(err.calculator, "iRT-C18");
        assert_eq!(err.found, 7);
        assert_eq!(err.required, 8);
    }

    #[test]
    fn test_small_sets_need_everything() {
        let calc = calculator(5);
        let candidates: Vec<String> = (0..4).map(|i| format!("STD{}K", i)).collect();
        let refs: Vec<&str> = candidates.iter().map(|s| s.as_str()).collect();
        assert!(calc.choose_regression_peptides(&refs).is_err());
    }
}
