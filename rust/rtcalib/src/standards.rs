//! Calibration against a fixed set of standard peptides, falling back to
//! peptides shared with previous runs when too few standards were measured.

use crate::calculators::ProjectCalculator;
use crate::config::RegressionConfig;
use crate::models::{
    MeasuredPoint,
    ReferencePeptide,
};
use crate::regression::RegressionModel;
use crate::score_cache::ScoreCache;
use crate::statistics::Statistics;
use crate::threshold::ThresholdSearch;
use serde::Serialize;
use std::collections::{
    BTreeMap,
    HashMap,
    HashSet,
};
use tracing::{
    debug,
    info,
};

pub const PROJECT_CALCULATOR_NAME: &str = "project";

/// Read-only source of measured retention times keyed by peptide sequence.
pub trait RetentionTimeLookup {
    fn retention_time(&self, sequence: &str) -> Option<f64>;
}

impl RetentionTimeLookup for HashMap<String, f64> {
    fn retention_time(&self, sequence: &str) -> Option<f64> {
        self.get(sequence).copied()
    }
}

impl RetentionTimeLookup for BTreeMap<String, f64> {
    fn retention_time(&self, sequence: &str) -> Option<f64> {
        self.get(sequence).copied()
    }
}

/// First measurement of the sequence wins.
impl RetentionTimeLookup for [MeasuredPoint] {
    fn retention_time(&self, sequence: &str) -> Option<f64> {
        self.iter()
            .find(|p| p.sequence() == sequence)
            .map(|p| p.retention_time())
    }
}

/// Which route produced a [`StandardsFit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegressionSource {
    /// Fit directly on the measured standards.
    Standards { used: usize, dropped: Vec<String> },
    /// Fit on peptides shared with the existing library.
    SharedPeptides { retained: usize, excluded: usize },
}

/// A standards calibration: predicts retention time from iRT score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardsFit {
    pub model: RegressionModel,
    pub r: f64,
    pub source: RegressionSource,
}

#[derive(Debug, Clone, Default)]
pub struct StandardsRegression {
    config: RegressionConfig,
}

impl StandardsRegression {
    pub fn new(config: RegressionConfig) -> Self {
        Self { config }
    }

    /// Calibrates retention time against iRT.
    ///
    /// Tries the measured standards first; if too few were measured or they
    /// never correlate well enough, uses the `existing` library peptides.
    /// Progress is reported through `tracing` at info level.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn fit<L: RetentionTimeLookup + ?Sized>(
        &self,
        lookup: &L,
        standards: &[ReferencePeptide],
        existing: &[ReferencePeptide],
    ) -> Option<StandardsFit> {
        if let Some(fit) = self.fit_standards(lookup, standards) {
            return Some(fit);
        }
        if existing.is_empty() {
            info!("No shared peptides to fall back on, no usable regression");
            return None;
        }
        self.fit_shared(lookup, standards, existing)
    }

    fn fit_standards<L: RetentionTimeLookup + ?Sized>(
        &self,
        lookup: &L,
        standards: &[ReferencePeptide],
    ) -> Option<StandardsFit> {
        let mut seen = HashSet::with_capacity(standards.len());
        let mut sequences = Vec::new();
        let mut irts = Vec::new();
        let mut times = Vec::new();
        for pep in standards {
            if !seen.insert(pep.sequence.as_str()) {
                continue;
            }
            match lookup.retention_time(&pep.sequence) {
                Some(time) if time.is_finite() => {
                    sequences.push(pep.sequence.as_str());
                    irts.push(pep.score);
                    times.push(time);
                }
                _ => debug!("Standard {} was not measured", pep.sequence),
            }
        }

        let rule = self.config.standard_count_rule();
        if !rule.is_acceptable(sequences.len(), seen.len()) {
            info!(
                "Measured {} of {} standards, {} required",
                sequences.len(),
                seen.len(),
                rule.required(seen.len())
            );
            return None;
        }

        let mut dropped = Vec::new();
        loop {
            let r = Statistics::new(&times).r(&Statistics::new(&irts));
            if self.config.is_above_threshold(r) {
                let model = RegressionModel::fit(&irts, &times);
                if !model.is_finite() {
                    return None;
                }
                return Some(StandardsFit {
                    model,
                    r,
                    source: RegressionSource::Standards {
                        used: sequences.len(),
                        dropped,
                    },
                });
            }
            // Two points always make a line.
            if sequences.len() <= 2 {
                info!(
                    "Standards correlation {:.4} below {} with no points left to drop",
                    r, self.config.correlation_threshold
                );
                return None;
            }

            // Drop whichever standard improves the correlation the most.
            let mut to_drop: Option<(usize, f64)> = None;
            for i in 0..sequences.len() {
                let (x, y) = (without(&irts, i), without(&times, i));
                let r = Statistics::new(&y).r(&Statistics::new(&x));
                if !r.is_nan() && to_drop.is_none_or(|(_, best_r)| r > best_r) {
                    to_drop = Some((i, r));
                }
            }
            let (idx, new_r) = to_drop?;
            info!(
                "Dropping standard {} (r {:.4} -> {:.4})",
                sequences[idx], r, new_r
            );
            dropped.push(sequences.remove(idx).to_string());
            irts.remove(idx);
            times.remove(idx);
        }
    }

    fn fit_shared<L: RetentionTimeLookup + ?Sized>(
        &self,
        lookup: &L,
        standards: &[ReferencePeptide],
        existing: &[ReferencePeptide],
    ) -> Option<StandardsFit> {
        let calculator = ProjectCalculator::new(PROJECT_CALCULATOR_NAME, standards, existing);
        let standard_set: HashSet<&str> = standards.iter().map(|p| p.sequence.as_str()).collect();

        let mut seen = HashSet::new();
        let mut standard_points = Vec::new();
        let mut variable_points = Vec::new();
        for pep in standards.iter().chain(existing.iter()) {
            if !seen.insert(pep.sequence.as_str()) {
                continue;
            }
            let Some(time) = lookup.retention_time(&pep.sequence) else {
                continue;
            };
            match MeasuredPoint::new(pep.sequence.clone(), time) {
                Ok(point) if standard_set.contains(pep.sequence.as_str()) => {
                    standard_points.push(point)
                }
                Ok(point) => variable_points.push(point),
                Err(e) => debug!("Skipping measurement: {}", e),
            }
        }

        let measured: Vec<MeasuredPoint> = standard_points
            .iter()
            .chain(variable_points.iter())
            .cloned()
            .collect();
        info!(
            "Falling back to {} shared peptides ({} standards, {} library peptides known)",
            measured.len(),
            standard_points.len(),
            calculator.library_count()
        );

        let sequences: Vec<&str> = measured.iter().map(|p| p.sequence()).collect();
        let mut cache = ScoreCache::with_peptides(&[&calculator], &sequences, None);

        let search = ThresholdSearch::from_config(&self.config);
        let result = search.run(
            &measured,
            &standard_points,
            &variable_points,
            &calculator,
            Some(&mut cache),
            None,
        )?;
        if !result.is_above_threshold() {
            info!(
                "Shared peptide regression stayed below threshold (r = {:.4})",
                result.fit().r()
            );
            return None;
        }

        let statistics = result.fit().statistics();
        if statistics.len() < self.config.min_refined_points {
            info!(
                "Shared peptide regression kept {} points, {} required",
                statistics.len(),
                self.config.min_refined_points
            );
            return None;
        }

        // Refit on the calculator's own scores for the retained peptides so the
        // line maps iRT to time.
        let retained = statistics.measured_points();
        let scores: Vec<f64> = retained
            .iter()
            .map(|p| cache.score(&calculator, p.sequence()))
            .collect();
        let times: Vec<f64> = retained.iter().map(|p| p.retention_time()).collect();
        let model = RegressionModel::fit(&scores, &times);
        if !model.is_finite() {
            return None;
        }
        let r = Statistics::new(&times).r(&Statistics::new(&scores));
        info!(
            "Shared peptide regression: slope {:.4}, intercept {:.4}, r {:.4} over {} peptides",
            model.slope,
            model.intercept,
            r,
            statistics.len()
        );

        Some(StandardsFit {
            model,
            r,
            source: RegressionSource::SharedPeptides {
                retained: statistics.len(),
                excluded: result.excluded().len(),
            },
        })
    }
}

fn without(values: &[f64], idx: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, v)| *v)
        .collect()
}
