//! Outlier trimming until a regression clears a correlation threshold.
//!
//! Variable points are ranked once by how far they sit from the initial fit.
//! A binary search then looks for the largest number of them that can be kept
//! while the refit still clears the threshold, followed by a linear sweep to
//! settle the exact boundary. Required (standard) points are never removed.

use crate::calculators::RetentionScoreCalculator;
use crate::config::{
    RegressionConfig,
    is_above_threshold,
};
use crate::engine::{
    INTERNAL_REGRESSION_NAME,
    RegressionEngine,
    RegressionFit,
};
use crate::models::MeasuredPoint;
use crate::score_cache::ScoreCache;
use std::collections::BTreeSet;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use tracing::{
    debug,
    info,
    warn,
};

/// Outcome of a threshold search.
#[derive(Debug, Clone)]
pub struct ThresholdResult<'a> {
    fit: RegressionFit<'a>,
    /// Indices into the variable points that were left out.
    excluded: BTreeSet<usize>,
    above_threshold: bool,
}

impl<'a> ThresholdResult<'a> {
    pub fn fit(&self) -> &RegressionFit<'a> {
        &self.fit
    }

    pub fn into_fit(self) -> RegressionFit<'a> {
        self.fit
    }

    pub fn excluded(&self) -> &BTreeSet<usize> {
        &self.excluded
    }

    pub fn retained_points(&self) -> usize {
        self.fit.statistics().len()
    }

    /// Whether the final fit cleared the threshold. A search that never
    /// manages to still returns its last fit.
    pub fn is_above_threshold(&self) -> bool {
        self.above_threshold
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdSearch {
    threshold: f64,
    precision: Option<u32>,
    engine: RegressionEngine,
}

impl ThresholdSearch {
    pub fn new(threshold: f64, precision: Option<u32>) -> Self {
        Self {
            threshold,
            precision,
            engine: RegressionEngine::default(),
        }
    }

    pub fn from_config(config: &RegressionConfig) -> Self {
        Self {
            threshold: config.correlation_threshold,
            precision: config.correlation_precision,
            engine: RegressionEngine::new(*config),
        }
    }

    fn clears(&self, r: f64) -> bool {
        is_above_threshold(r, self.threshold, self.precision)
    }

    /// Fits `measured` with `calculator` and, if the correlation is too low,
    /// drops the worst of `variable` until it clears the threshold.
    ///
    /// Returns `None` only when the initial fit fails. Setting `cancel` stops
    /// the search at the next iteration with the best result found so far.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn run<'a>(
        &self,
        measured: &[MeasuredPoint],
        standard: &[MeasuredPoint],
        variable: &[MeasuredPoint],
        calculator: &'a dyn RetentionScoreCalculator,
        cache: Option<&mut ScoreCache>,
        cancel: Option<&AtomicBool>,
    ) -> Option<ThresholdResult<'a>> {
        let mut local_cache;
        let cache = match cache {
            Some(cache) => cache,
            None => {
                local_cache = ScoreCache::new();
                &mut local_cache
            }
        };
        let cancelled = || cancel.is_some_and(|c| c.load(Ordering::Relaxed));

        let initial = self.engine.fit(
            INTERNAL_REGRESSION_NAME,
            &[calculator],
            measured,
            Some(&mut *cache),
            true,
        )?;
        if self.clears(initial.r()) {
            return Some(self.finish(initial, BTreeSet::new()));
        }

        let ranking = rank_by_deviation(&initial, variable, calculator, cache);
        let total = variable.len() as isize;

        let mut best = (initial, BTreeSet::new());
        let mut left: isize = 0;
        let mut right: isize = total;

        // Keeping `mid` points is fine -> try keeping more, otherwise fewer.
        while left <= right {
            if cancelled() {
                info!("Threshold search cancelled");
                return Some(self.finish(best.0, best.1));
            }
            let mid = (left + right) / 2;
            let (fit, excluded) =
                self.recalc(mid, &ranking, standard, variable, calculator, cache);
            let Some(fit) = fit else {
                warn!("No regression when keeping {} points, using last good fit", mid);
                return Some(self.finish(best.0, best.1));
            };
            if self.clears(fit.r()) {
                best = (fit, excluded);
                left = mid + 1;
            } else {
                right = mid - 1;
            }
        }

        // Nothing cleared: walk down from the full set one point at a time.
        let mut worst_in = total - 1;
        if self.clears(best.0.r()) {
            // Re-admit points while the correlation holds.
            let mut best_out = left;
            loop {
                if cancelled() {
                    break;
                }
                let (fit, _) = self.recalc(best_out, &ranking, standard, variable, calculator, cache);
                let holds = fit.is_some_and(|f| self.clears(f.r()));
                if best_out >= total || !holds {
                    break;
                }
                best_out += 1;
            }
            worst_in = best_out;
        }

        // Remove points until the threshold is met; two points always make a line.
        loop {
            if cancelled() {
                info!("Threshold search cancelled");
                return Some(self.finish(best.0, best.1));
            }
            let (fit, excluded) =
                self.recalc(worst_in, &ranking, standard, variable, calculator, cache);
            let Some(fit) = fit else {
                return Some(self.finish(best.0, best.1));
            };
            if worst_in <= 2 || self.clears(fit.r()) {
                return Some(self.finish(fit, excluded));
            }
            worst_in -= 1;
        }
    }

    /// Refits keeping the best `keep + 1` variable points plus every standard.
    fn recalc<'a>(
        &self,
        keep: isize,
        ranking: &[usize],
        standard: &[MeasuredPoint],
        variable: &[MeasuredPoint],
        calculator: &'a dyn RetentionScoreCalculator,
        cache: &mut ScoreCache,
    ) -> (Option<RegressionFit<'a>>, BTreeSet<usize>) {
        let total = ranking.len() as isize;
        let drop = (total - keep - 1).clamp(0, total) as usize;
        let excluded: BTreeSet<usize> = ranking[..drop].iter().copied().collect();

        let mut points: Vec<MeasuredPoint> = Vec::with_capacity(variable.len() + standard.len());
        points.extend(
            variable
                .iter()
                .enumerate()
                .filter(|(i, _)| !excluded.contains(i))
                .map(|(_, p)| p.clone()),
        );
        points.extend(standard.iter().cloned());

        let fit = self.engine.fit(
            INTERNAL_REGRESSION_NAME,
            &[calculator],
            &points,
            Some(cache),
            true,
        );
        debug!(
            "Kept {} of {} variable points, r = {:?}",
            variable.len() - excluded.len(),
            variable.len(),
            fit.as_ref().map(|f| f.r())
        );
        (fit, excluded)
    }

    fn finish<'a>(&self, fit: RegressionFit<'a>, excluded: BTreeSet<usize>) -> ThresholdResult<'a> {
        let above_threshold = self.clears(fit.r());
        ThresholdResult {
            fit,
            excluded,
            above_threshold,
        }
    }
}

/// Variable point indices, worst fitting first.
///
/// Points with a zero time or an unknown score rank as worst so they are
/// dropped before anything else.
fn rank_by_deviation(
    initial: &RegressionFit,
    variable: &[MeasuredPoint],
    calculator: &dyn RetentionScoreCalculator,
    cache: &mut ScoreCache,
) -> Vec<usize> {
    let model = initial.model();
    let unknown = calculator.unknown_score();
    let deviations: Vec<f64> = variable
        .iter()
        .map(|p| {
            let score = cache.score(calculator, p.sequence());
            if p.retention_time() == 0.0 || score == unknown {
                f64::MAX
            } else {
                (model.predict(score) - p.retention_time()).abs()
            }
        })
        .collect();

    let mut ranking: Vec<usize> = (0..variable.len()).collect();
    // Stable, so equal deviations keep input order.
    ranking.sort_by(|&a, &b| deviations[b].total_cmp(&deviations[a]));
    ranking
}
