//! Best-calculator selection and the score-to-time fit.

use crate::calculators::RetentionScoreCalculator;
use crate::config::RegressionConfig;
use crate::models::MeasuredPoint;
use crate::regression::{
    RegressionModel,
    RetentionTimeRegression,
    RetentionTimeStatistics,
};
use crate::score_cache::ScoreCache;
use crate::statistics::Statistics;
use std::collections::HashMap;
use tracing::{
    debug,
    warn,
};

/// Name given to regressions computed on the fly while refining a fit.
pub const INTERNAL_REGRESSION_NAME: &str = "__internal__";

/// A fitted regression together with the calculator that won the selection
/// and the per-peptide statistics it was fit on.
#[derive(Clone)]
pub struct RegressionFit<'a> {
    regression: RetentionTimeRegression,
    model: RegressionModel,
    calculator: &'a dyn RetentionScoreCalculator,
    statistics: RetentionTimeStatistics,
}

impl std::fmt::Debug for RegressionFit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegressionFit")
            .field("regression", &self.regression)
            .field("calculator", &self.calculator.name())
            .field("r", &self.statistics.r())
            .field("points", &self.statistics.len())
            .finish()
    }
}

impl<'a> RegressionFit<'a> {
    pub fn regression(&self) -> &RetentionTimeRegression {
        &self.regression
    }

    pub fn model(&self) -> RegressionModel {
        self.model
    }

    pub fn calculator(&self) -> &'a dyn RetentionScoreCalculator {
        self.calculator
    }

    pub fn statistics(&self) -> &RetentionTimeStatistics {
        &self.statistics
    }

    pub fn r(&self) -> f64 {
        self.statistics.r()
    }

    pub fn time_window(&self) -> f64 {
        self.regression.time_window()
    }

    pub fn predict_time_for_score(&self, score: f64) -> Option<f64> {
        self.regression.predict_time_for_score(score)
    }

    pub fn predict_time_for_sequence(
        &self,
        sequence: &str,
        cache: Option<&mut ScoreCache>,
    ) -> Option<f64> {
        self.regression
            .predict_time_for_sequence(self.calculator, sequence, cache)
    }

    /// Absolute distance between predicted and observed time for a peptide
    /// that took part in the fit.
    pub fn deviation(&self, sequence: &str) -> Option<f64> {
        let idx = self
            .statistics
            .peptides()
            .iter()
            .position(|p| p == sequence)?;
        Some((self.statistics.predictions()[idx] - self.statistics.observed_times()[idx]).abs())
    }
}

struct Candidate<'a, 'p> {
    calculator: &'a dyn RetentionScoreCalculator,
    peptides: Vec<&'p str>,
    scores: Vec<f64>,
    times: Vec<f64>,
    r: f64,
}

/// Chooses among candidate calculators and fits retention time against score.
#[derive(Debug, Clone, Default)]
pub struct RegressionEngine {
    config: RegressionConfig,
}

impl RegressionEngine {
    pub fn new(config: RegressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Fits a regression with whichever usable calculator correlates best
    /// with the measured times.
    ///
    /// With `all_peptides` every measured peptide is scored; otherwise each
    /// calculator picks its own regression peptides and is skipped when it
    /// cannot. Returns `None` when no calculator produces a fit.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn fit<'a>(
        &self,
        name: &str,
        calculators: &[&'a dyn RetentionScoreCalculator],
        measured: &[MeasuredPoint],
        cache: Option<&mut ScoreCache>,
        all_peptides: bool,
    ) -> Option<RegressionFit<'a>> {
        let mut local_cache;
        let cache = match cache {
            Some(cache) => cache,
            None => {
                local_cache = ScoreCache::new();
                &mut local_cache
            }
        };

        let mut sequences: Vec<&str> = Vec::with_capacity(measured.len());
        let mut observed: HashMap<&str, f64> = HashMap::with_capacity(measured.len());
        for point in measured {
            if !observed.contains_key(point.sequence()) {
                observed.insert(point.sequence(), point.retention_time());
                sequences.push(point.sequence());
            }
        }

        let mut best: Option<Candidate> = None;
        for &calculator in calculators {
            if !calculator.is_usable() {
                debug!("Skipping unusable calculator {}", calculator.name());
                continue;
            }
            let peptides = if all_peptides {
                sequences.clone()
            } else {
                match calculator.choose_regression_peptides(&sequences) {
                    Ok(peptides) => peptides,
                    Err(e) => {
                        debug!("Excluding calculator: {}", e);
                        continue;
                    }
                }
            };

            let scores: Vec<f64> = peptides
                .iter()
                .map(|seq| cache.score(calculator, seq))
                .collect();
            let times: Vec<f64> = peptides.iter().map(|seq| observed[seq]).collect();

            let unknown = calculator.unknown_score();
            let r = if scores.iter().any(|s| *s == unknown) {
                0.0
            } else {
                Statistics::new(&scores).r(&Statistics::new(&times))
            };
            debug!(
                "Calculator {} has r = {} over {} peptides",
                calculator.name(),
                r,
                peptides.len()
            );

            // NaN never wins, ties go to the earlier candidate.
            if best.as_ref().is_none_or(|b| r > b.r) && !r.is_nan() {
                best = Some(Candidate {
                    calculator,
                    peptides,
                    scores,
                    times,
                    r,
                });
            }
        }

        let best = best?;
        let (x, y) = (Statistics::new(&best.scores), Statistics::new(&best.times));
        let model = RegressionModel::new(y.slope(&x), y.intercept(&x));
        if !model.is_finite() {
            debug!(
                "Best calculator {} gave a degenerate fit {:?}",
                best.calculator.name(),
                model
            );
            return None;
        }

        let residuals = y.residuals(&x);
        let time_window = (self.config.window_factor * Statistics::new(&residuals).std_dev())
            .max(self.config.min_time_window);

        let regression = match RetentionTimeRegression::new(
            name,
            best.calculator.name(),
            Some(model.slope),
            Some(model.intercept),
            time_window,
        ) {
            Ok(regression) => regression,
            Err(e) => {
                warn!("Unable to build regression {}: {}", name, e);
                return None;
            }
        };

        let predictions = best.scores.iter().map(|s| model.predict(*s)).collect();
        let statistics = RetentionTimeStatistics::new(
            best.r,
            best.peptides.iter().map(|p| p.to_string()).collect(),
            best.scores,
            predictions,
            best.times,
        );

        Some(RegressionFit {
            regression,
            model,
            calculator: best.calculator,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{
        LibraryCalculator,
        ProjectCalculator,
    };
    use crate::models::ReferencePeptide;

    fn peptides(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("PEP{}TIDEK", i)).collect()
    }

    fn measured(seqs: &[String], f: impl Fn(usize) -> f64) -> Vec<MeasuredPoint> {
        seqs.iter()
            .enumerate()
            .map(|(i, s)| MeasuredPoint::new(s.clone(), f(i)).unwrap())
            .collect()
    }

    fn library(name: &str, seqs: &[String], f: impl Fn(usize) -> f64) -> LibraryCalculator {
        LibraryCalculator::new(
            name,
            seqs.iter()
                .enumerate()
                .map(|(i, s)| ReferencePeptide::new(s.clone(), f(i)))
                .collect(),
        )
    }

    #[test]
    fn test_fit_perfect_line() {
        let seqs = peptides(10);
        let calc = library("lib", &seqs, |i| i as f64);
        let points = measured(&seqs, |i| 20.0 + 2.0 * i as f64);
        let fit = RegressionEngine::default()
            .fit("test", &[&calc], &points, None, false)
            .unwrap();

        assert!((fit.r() - 1.0).abs() < 1e-12);
        assert!((fit.model().slope - 2.0).abs() < 1e-9);
        assert!((fit.model().intercept - 20.0).abs() < 1e-9);
        // Zero residuals floor at the minimum window.
        assert_eq!(fit.time_window(), 0.5);
        assert_eq!(fit.regression().name(), "test");
        assert_eq!(fit.regression().calculator_name(), "lib");
        assert_eq!(fit.statistics().len(), 10);
        let predicted = fit.predict_time_for_sequence("PEP3TIDEK", None).unwrap();
        assert!((predicted - 26.0).abs() < 1e-9);
        assert!(fit.deviation("PEP3TIDEK").unwrap() < 1e-9);
        assert_eq!(fit.deviation("NOTTHERE"), None);
    }

    #[test]
    fn test_unknown_sequence_predicts_from_sentinel() {
        let seqs = peptides(10);
        let calc = library("lib", &seqs, |i| i as f64);
        let points = measured(&seqs, |i| 20.0 + 2.0 * i as f64);
        let fit = RegressionEngine::default()
            .fit("test", &[&calc], &points, None, false)
            .unwrap();
        let expected = fit.model().predict(calc.unknown_score());
        let predicted = fit.predict_time_for_sequence("UNSEEN", None).unwrap();
        assert!((predicted - expected).abs() < 1e-9);
    }

    #[test]
    fn test_window_from_residuals() {
        let seqs = peptides(10);
        let calc = library("lib", &seqs, |i| i as f64);
        let points = measured(&seqs, |i| {
            10.0 + i as f64 + if i % 2 == 0 { 1.0 } else { -1.0 }
        });
        let fit = RegressionEngine::default()
            .fit("noisy", &[&calc], &points, None, false)
            .unwrap();
        let residual_sd = Statistics::new(&fit.statistics().residuals()).std_dev();
        assert!((fit.time_window() - 4.0 * residual_sd).abs() < 1e-9);
        assert!(fit.time_window() > 0.5);
    }

    #[test]
    fn test_best_calculator_wins_regardless_of_order() {
        let seqs = peptides(12);
        let good = library("good", &seqs, |i| i as f64);
        let bad = library("bad", &seqs, |i| ((i * 7) % 12) as f64);
        let points = measured(&seqs, |i| 5.0 + 0.5 * i as f64);

        let engine = RegressionEngine::default();
        let fit = engine
            .fit("a", &[&good, &bad], &points, None, false)
            .unwrap();
        assert_eq!(fit.calculator().name(), "good");
        let fit = engine
            .fit("b", &[&bad, &good], &points, None, false)
            .unwrap();
        assert_eq!(fit.calculator().name(), "good");
    }

    #[test]
    fn test_ties_go_to_first_candidate() {
        let seqs = peptides(10);
        let first = library("first", &seqs, |i| i as f64);
        let second = library("second", &seqs, |i| 2.0 * i as f64);
        let points = measured(&seqs, |i| i as f64);
        let fit = RegressionEngine::default()
            .fit("tie", &[&first, &second], &points, None, false)
            .unwrap();
        assert_eq!(fit.calculator().name(), "first");
    }

    #[test]
    fn test_incomplete_standards_excluded() {
        let seqs = peptides(20);
        // Knows all 20, but only 10 are measured -> needs 16
        let strict = library("strict", &seqs, |i| i as f64);
        let fallback = library("fallback", &seqs[..10], |i| -(i as f64));
        let points = measured(&seqs[..10], |i| 30.0 - i as f64);
        let fit = RegressionEngine::default()
            .fit("r", &[&strict, &fallback], &points, None, false)
            .unwrap();
        assert_eq!(fit.calculator().name(), "fallback");

        let none = RegressionEngine::default().fit("r", &[&strict], &points, None, false);
        assert!(none.is_none());
    }

    #[test]
    fn test_unusable_calculators_skipped() {
        let seqs = peptides(10);
        let empty = ProjectCalculator::new("empty", &[], &[]);
        let calc = library("lib", &seqs, |i| i as f64);
        let points = measured(&seqs, |i| i as f64);
        let fit = RegressionEngine::default()
            .fit("r", &[&empty, &calc], &points, None, false)
            .unwrap();
        assert_eq!(fit.calculator().name(), "lib");
        assert!(
            RegressionEngine::default()
                .fit("r", &[&empty], &points, None, false)
                .is_none()
        );
    }

    #[test]
    fn test_unknown_score_forces_zero_correlation() {
        let seqs = peptides(10);
        // Only knows the first 9 peptides.
        let partial = library("partial", &seqs[..9], |i| i as f64);
        let noisy = library("noisy", &seqs, |i| {
            i as f64 + if i % 2 == 0 { 0.4 } else { -0.4 }
        });
        let points = measured(&seqs, |i| i as f64);

        let fit = RegressionEngine::default()
            .fit("r", &[&partial, &noisy], &points, None, true)
            .unwrap();
        assert_eq!(fit.calculator().name(), "noisy");

        let fit = RegressionEngine::default()
            .fit("r", &[&partial], &points, None, true)
            .unwrap();
        assert_eq!(fit.r(), 0.0);
    }

    #[test]
    fn test_duplicate_measurements_first_wins() {
        let seqs = peptides(10);
        let calc = library("lib", &seqs, |i| i as f64);
        let mut points = measured(&seqs, |i| 1.0 + i as f64);
        points.push(MeasuredPoint::new(seqs[0].clone(), 500.0).unwrap());
        let fit = RegressionEngine::default()
            .fit("r", &[&calc], &points, None, false)
            .unwrap();
        assert_eq!(fit.statistics().len(), 10);
        assert_eq!(fit.statistics().observed_times()[0], 1.0);
    }

    #[test]
    fn test_cache_is_populated() {
        let seqs = peptides(10);
        let calc = library("lib", &seqs, |i| i as f64);
        let points = measured(&seqs, |i| i as f64);
        let mut cache = ScoreCache::new();
        RegressionEngine::default()
            .fit("r", &[&calc], &points, Some(&mut cache), false)
            .unwrap();
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get("lib", "PEP4TIDEK"), Some(4.0));
    }

    #[test]
    fn test_single_point_has_no_fit() {
        let seqs = peptides(1);
        let calc = ProjectCalculator::new(
            "p",
            &[ReferencePeptide::new(seqs[0].clone(), 1.0)],
            &[],
        );
        let points = measured(&seqs, |_| 3.0);
        assert!(
            RegressionEngine::default()
                .fit("r", &[&calc], &points, None, true)
                .is_none()
        );
    }
}
