use super::{
    RetentionScoreCalculator,
    dedup_sequences,
};
use crate::errors::IncompleteStandardsError;
use crate::models::ReferencePeptide;
use std::collections::HashMap;

/// Calculator derived from a project's own data: a pool of designated
/// standards plus every library peptide with a known score.
///
/// Lookups hit the standards first, so a sequence present in both pools
/// scores with its standard value.
#[derive(Debug, Clone)]
pub struct ProjectCalculator {
    name: String,
    standards: HashMap<String, f64>,
    library: HashMap<String, f64>,
    unknown_score: f64,
}

fn to_lookup(peptides: &[ReferencePeptide]) -> HashMap<String, f64> {
    let mut lookup = HashMap::with_capacity(peptides.len());
    for pep in peptides.iter().filter(|p| p.score.is_finite()) {
        lookup.entry(pep.sequence.clone()).or_insert(pep.score);
    }
    lookup
}

fn min_score(lookup: &HashMap<String, f64>) -> Option<f64> {
    lookup.values().copied().reduce(f64::min)
}

impl ProjectCalculator {
    pub fn new(
        name: impl Into<String>,
        standards: &[ReferencePeptide],
        library: &[ReferencePeptide],
    ) -> Self {
        let standards = to_lookup(standards);
        let library = to_lookup(library);

        // min(a, b) - |a - b|. Falls a further unit lower when both pools
        // share the same minimum so the sentinel never equals a real score.
        let unknown_score = match (min_score(&standards), min_score(&library)) {
            (Some(a), Some(b)) if a != b => a.min(b) - (a - b).abs(),
            (Some(a), Some(_)) => a - 1.0,
            (Some(a), None) | (None, Some(a)) => a - 1.0,
            (None, None) => 0.0,
        };

        Self {
            name: name.into(),
            standards,
            library,
            unknown_score,
        }
    }

    pub fn standard_count(&self) -> usize {
        self.standards.len()
    }

    pub fn library_count(&self) -> usize {
        self.library.len()
    }
}

impl RetentionScoreCalculator for ProjectCalculator {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, sequence: &str) -> Option<f64> {
        self.standards
            .get(sequence)
            .or_else(|| self.library.get(sequence))
            .copied()
    }

    fn unknown_score(&self) -> f64 {
        self.unknown_score
    }

    fn is_usable(&self) -> bool {
        !self.standards.is_empty() || !self.library.is_empty()
    }

    /// Every candidate this calculator can score; never fails.
    fn choose_regression_peptides<'a>(
        &self,
        candidates: &[&'a str],
    ) -> Result<Vec<&'a str>, IncompleteStandardsError> {
        Ok(dedup_sequences(candidates)
            .into_iter()
            .filter(|seq| self.score(seq).is_some())
            .collect())
    }

    fn standard_peptides<'a>(&self, candidates: &[&'a str]) -> Vec<&'a str> {
        dedup_sequences(candidates)
            .into_iter()
            .filter(|seq| self.standards.contains_key(*seq))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_score_dominated() {
        let calc = ProjectCalculator::new(
            "project",
            &[ReferencePeptide::new("S", 10.0)],
            &[ReferencePeptide::new("L", 5.0)],
        );
        assert_eq!(calc.unknown_score(), 0.0);
        assert!(calc.unknown_score() < 5.0);
    }

    #[test]
    fn test_unknown_score_equal_minima() {
        let calc = ProjectCalculator::new(
            "project",
            &[ReferencePeptide::new("S", 5.0)],
            &[ReferencePeptide::new("L", 5.0)],
        );
        assert!(calc.unknown_score() < 5.0);
    }

    #[test]
    fn test_standards_take_precedence() {
        let calc = ProjectCalculator::new(
            "project",
            &[ReferencePeptide::new("SHARED", 42.0)],
            &[
                ReferencePeptide::new("SHARED", 1.0),
                ReferencePeptide::new("LIBONLY", 7.0),
            ],
        );
        assert_eq!(calc.score("SHARED"), Some(42.0));
        assert_eq!(calc.score("LIBONLY"), Some(7.0));
        assert_eq!(calc.score("MISSING"), None);
        assert_eq!(calc.standard_peptides(&["SHARED", "LIBONLY"]), vec!["SHARED"]);
    }

    #[test]
    fn test_choose_regression_peptides_scorable_only() {
        let calc = ProjectCalculator::new(
            "project",
            &[ReferencePeptide::new("A", 1.0)],
            &[ReferencePeptide::new("B", 2.0)],
        );
        let chosen = calc
            .choose_regression_peptides(&["A", "X", "B", "A"])
            .unwrap();
        assert_eq!(chosen, vec!["A", "B"]);
    }

    #[test]
    fn test_empty_calculator_unusable() {
        let calc = ProjectCalculator::new("empty", &[], &[]);
        assert!(!calc.is_usable());
    }
}
