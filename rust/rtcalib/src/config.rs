use crate::calculators::StandardCountRule;
use serde::{
    Deserialize,
    Serialize,
};

/// Tunables shared by the regression engine, threshold search and the
/// standards regression. Defaults match the usual iRT calibration settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Minimum acceptable Pearson r.
    pub correlation_threshold: f64,
    /// Decimal digits r is rounded to before comparing against the threshold.
    pub correlation_precision: Option<u32>,
    pub min_standard_count: usize,
    pub min_standard_fraction: f64,
    /// The suggested time window is this many residual standard deviations.
    pub window_factor: f64,
    pub min_time_window: f64,
    /// Points a shared-peptide regression must retain to be accepted.
    pub min_refined_points: usize,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.99,
            correlation_precision: Some(4),
            min_standard_count: 8,
            min_standard_fraction: 0.80,
            window_factor: 4.0,
            min_time_window: 0.5,
            min_refined_points: 20,
        }
    }
}

impl RegressionConfig {
    pub fn standard_count_rule(&self) -> StandardCountRule {
        StandardCountRule {
            min_count: self.min_standard_count,
            min_fraction: self.min_standard_fraction,
        }
    }

    pub fn is_above_threshold(&self, r: f64) -> bool {
        is_above_threshold(r, self.correlation_threshold, self.correlation_precision)
    }
}

/// `value` rounded to `precision` decimals is at least `threshold`.
/// `NaN` never clears a threshold.
pub fn is_above_threshold(value: f64, threshold: f64, precision: Option<u32>) -> bool {
    if value.is_nan() {
        return false;
    }
    let value = match precision {
        Some(digits) => {
            let factor = 10f64.powi(digits as i32);
            (value * factor).round() / factor
        }
        None => value,
    };
    value >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_rounding() {
        assert!(is_above_threshold(0.98996, 0.99, Some(4)));
        assert!(!is_above_threshold(0.98996, 0.99, None));
        assert!(!is_above_threshold(0.98994, 0.99, Some(4)));
        assert!(!is_above_threshold(f64::NAN, 0.0, Some(4)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RegressionConfig =
            serde_json::from_str(r#"{"correlation_threshold": 0.95}"#).unwrap();
        assert_eq!(config.correlation_threshold, 0.95);
        assert_eq!(config.min_refined_points, 20);
        assert_eq!(config.standard_count_rule(), StandardCountRule::default());
    }
}
