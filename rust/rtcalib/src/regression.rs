use crate::calculators::RetentionScoreCalculator;
use crate::errors::InvalidRegressionError;
use crate::models::MeasuredPoint;
use crate::score_cache::ScoreCache;
use crate::statistics::Statistics;
use serde::{
    Deserialize,
    Serialize,
};
use std::cell::OnceCell;
use std::collections::HashMap;

/// A straight line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub slope: f64,
    pub intercept: f64,
}

impl RegressionModel {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Least squares line of `y` on `x`.
    pub fn fit(x: &[f64], y: &[f64]) -> Self {
        let (x, y) = (Statistics::new(x), Statistics::new(y));
        Self {
            slope: y.slope(&x),
            intercept: y.intercept(&x),
        }
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Inverse of [`RegressionModel::predict`]. Not finite when the slope is zero.
    pub fn invert(&self, y: f64) -> f64 {
        (y - self.intercept) / self.slope
    }

    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }
}

/// A named score-to-time regression.
///
/// A regression without a conversion is waiting to be auto-calculated and
/// cannot predict anything yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionTimeRegression {
    name: String,
    calculator_name: String,
    conversion: Option<RegressionModel>,
    time_window: f64,
}

impl RetentionTimeRegression {
    pub fn new(
        name: impl Into<String>,
        calculator_name: impl Into<String>,
        slope: Option<f64>,
        intercept: Option<f64>,
        time_window: f64,
    ) -> Result<Self, InvalidRegressionError> {
        let conversion = match (slope, intercept) {
            (Some(slope), Some(intercept)) => {
                if !slope.is_finite() || !intercept.is_finite() {
                    return Err(InvalidRegressionError::NonFiniteConversion { slope, intercept });
                }
                Some(RegressionModel::new(slope, intercept))
            }
            (None, None) => None,
            (slope, intercept) => {
                return Err(InvalidRegressionError::MismatchedConversion { slope, intercept });
            }
        };
        // Written this way so NaN is rejected too.
        if !(time_window > 0.0) {
            return Err(InvalidRegressionError::NonPositiveTimeWindow(time_window));
        }
        Ok(Self {
            name: name.into(),
            calculator_name: calculator_name.into(),
            conversion,
            time_window,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calculator_name(&self) -> &str {
        &self.calculator_name
    }

    pub fn conversion(&self) -> Option<&RegressionModel> {
        self.conversion.as_ref()
    }

    pub fn time_window(&self) -> f64 {
        self.time_window
    }

    pub fn is_auto_calculated(&self) -> bool {
        self.conversion.is_none()
    }

    pub fn is_usable(&self) -> bool {
        self.conversion.is_some_and(|c| c.is_finite())
    }

    pub fn predict_time_for_score(&self, score: f64) -> Option<f64> {
        self.conversion.map(|c| c.predict(score))
    }

    /// Scores `sequence` (unknown score if unscorable) and converts it to a time.
    pub fn predict_time_for_sequence(
        &self,
        calculator: &dyn RetentionScoreCalculator,
        sequence: &str,
        cache: Option<&mut ScoreCache>,
    ) -> Option<f64> {
        let conversion = self.conversion?;
        let score = match cache {
            Some(cache) => cache.score(calculator, sequence),
            None => calculator
                .score(sequence)
                .unwrap_or(calculator.unknown_score()),
        };
        Some(conversion.predict(score))
    }
}

/// Per-peptide record of one fit attempt. All sequences are index aligned.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionTimeStatistics {
    r: f64,
    peptides: Vec<String>,
    scores: Vec<f64>,
    predictions: Vec<f64>,
    observed_times: Vec<f64>,
    #[serde(skip)]
    score_lookup: OnceCell<HashMap<String, f64>>,
}

impl RetentionTimeStatistics {
    /// # Panics
    /// Panics if the sequences differ in length.
    pub fn new(
        r: f64,
        peptides: Vec<String>,
        scores: Vec<f64>,
        predictions: Vec<f64>,
        observed_times: Vec<f64>,
    ) -> Self {
        let n = peptides.len();
        assert!(
            scores.len() == n && predictions.len() == n && observed_times.len() == n,
            "Statistics sequences must be index aligned ({} peptides, {} scores, {} predictions, {} times)",
            n,
            scores.len(),
            predictions.len(),
            observed_times.len()
        );
        Self {
            r,
            peptides,
            scores,
            predictions,
            observed_times,
            score_lookup: OnceCell::new(),
        }
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn peptides(&self) -> &[String] {
        &self.peptides
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    pub fn observed_times(&self) -> &[f64] {
        &self.observed_times
    }

    pub fn len(&self) -> usize {
        self.peptides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peptides.is_empty()
    }

    /// `observed - predicted` per peptide.
    pub fn residuals(&self) -> Vec<f64> {
        self.observed_times
            .iter()
            .zip(self.predictions.iter())
            .map(|(obs, pred)| obs - pred)
            .collect()
    }

    /// Sequence to score, first occurrence wins.
    pub fn score_lookup(&self) -> &HashMap<String, f64> {
        self.score_lookup.get_or_init(|| {
            let mut lookup = HashMap::with_capacity(self.peptides.len());
            for (seq, score) in self.peptides.iter().zip(self.scores.iter()) {
                lookup.entry(seq.clone()).or_insert(*score);
            }
            lookup
        })
    }

    /// The (peptide, observed time) pairs the fit was built on.
    pub fn measured_points(&self) -> Vec<MeasuredPoint> {
        self.peptides
            .iter()
            .zip(self.observed_times.iter())
            .filter_map(|(seq, time)| MeasuredPoint::new_allow_negative(seq.clone(), *time).ok())
            .collect()
    }
}
