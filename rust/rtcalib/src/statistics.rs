//! Descriptive statistics and simple linear regression over ordered samples.
//!
//! Nothing in here returns an error. Empty input, mismatched lengths and zero
//! variance all degrade to `f64::NAN`, so callers have to check `is_nan()`
//! (or `is_finite()`) before trusting a value.

/// Borrowed view over a sample, used as either the X or the Y series of a fit.
///
/// # Example
///
/// ```
/// use rtcalib::statistics::Statistics;
///
/// let times = Statistics::new(&[10.0, 10.5, 11.0, 11.5]);
/// let irts = Statistics::new(&[0.0, 1.0, 2.0, 3.0]);
/// assert_eq!(times.slope(&irts), 0.5);
/// assert_eq!(times.intercept(&irts), 10.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Statistics<'a> {
    values: &'a [f64],
}

impl<'a> Statistics<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Arithmetic mean, `NaN` for an empty sample.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.sum() / self.values.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .reduce(f64::min)
            .unwrap_or(f64::NAN)
    }

    pub fn max(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(f64::NAN)
    }

    pub fn median(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        let mut sorted = self.values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Sample variance using the corrected two-pass algorithm.
    ///
    /// The second term cancels the rounding error accumulated in the mean.
    pub fn variance(&self) -> f64 {
        let n = self.values.len() as f64;
        let mean = self.mean();
        let mut sum_sq = 0.0;
        let mut sum_dev = 0.0;
        for &x in self.values {
            let dev = x - mean;
            sum_sq += dev * dev;
            sum_dev += dev;
        }
        (sum_sq - (sum_dev * sum_dev) / n) / (n - 1.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Sample covariance (divides by `n - 1`). `NaN` on length mismatch.
    pub fn covariance(&self, other: &Statistics) -> f64 {
        if self.values.len() != other.values.len() {
            return f64::NAN;
        }
        let n = self.values.len() as f64;
        let (mean_x, mean_y) = (self.mean(), other.mean());
        let sum: f64 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum();
        sum / (n - 1.0)
    }

    /// Pearson correlation coefficient.
    ///
    /// Clamped to `[-1, 1]` when finite; rounding can push a perfect fit a
    /// hair past one.
    pub fn r(&self, other: &Statistics) -> f64 {
        let r = self.covariance(other) / (self.std_dev() * other.std_dev());
        if r.is_finite() {
            r.clamp(-1.0, 1.0)
        } else {
            f64::NAN
        }
    }

    /// Least squares slope treating `self` as Y and `x` as X.
    pub fn slope(&self, x: &Statistics) -> f64 {
        self.covariance(x) / x.variance()
    }

    /// Least squares intercept treating `self` as Y and `x` as X.
    pub fn intercept(&self, x: &Statistics) -> f64 {
        self.mean() - self.slope(x) * x.mean()
    }

    /// `y_i - (a * x_i + b)` for the least squares line of `self` on `x`.
    pub fn residuals(&self, x: &Statistics) -> Vec<f64> {
        if self.values.len() != x.values.len() {
            return Vec::new();
        }
        let slope = self.slope(x);
        let intercept = self.mean() - slope * x.mean();
        self.values
            .iter()
            .zip(x.values.iter())
            .map(|(y, x)| y - (slope * x + intercept))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anscombe's quartet, set 1. Mean x = 9, var x = 11, r ~= 0.816.
    const ANSCOMBE_X: [f64; 11] = [10.0, 8.0, 13.0, 9.0, 11.0, 14.0, 6.0, 4.0, 12.0, 7.0, 5.0];
    const ANSCOMBE_Y: [f64; 11] = [
        8.04, 6.95, 7.58, 8.81, 8.33, 9.96, 7.24, 4.26, 10.84, 4.82, 5.68,
    ];

    #[test]
    fn test_mean_and_variance() {
        let x = Statistics::new(&ANSCOMBE_X);
        assert_eq!(x.mean(), 9.0);
        assert!((x.variance() - 11.0).abs() < 1e-12);
        assert!((x.std_dev() - 11.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(x.sum(), 99.0);
        assert_eq!(x.min(), 4.0);
        assert_eq!(x.max(), 14.0);
        assert_eq!(x.median(), 9.0);
    }

    #[test]
    fn test_anscombe_fit() {
        let x = Statistics::new(&ANSCOMBE_X);
        let y = Statistics::new(&ANSCOMBE_Y);
        assert!((y.r(&x) - 0.816).abs() < 1e-3, "{}", y.r(&x));
        assert!((y.slope(&x) - 0.5001).abs() < 1e-3);
        assert!((y.intercept(&x) - 3.0001).abs() < 1e-3);
        let residuals = y.residuals(&x);
        assert_eq!(residuals.len(), ANSCOMBE_X.len());
        let residual_sum: f64 = residuals.iter().sum();
        assert!(residual_sum.abs() < 1e-9);
    }

    #[test]
    fn test_correlation_symmetric() {
        let x = Statistics::new(&ANSCOMBE_X);
        let y = Statistics::new(&ANSCOMBE_Y);
        assert!((x.r(&y) - y.r(&x)).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_correlation_is_bounded() {
        let x: Vec<f64> = (0..1000).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 7.0).collect();
        let neg: Vec<f64> = x.iter().map(|v| -3.0 * v).collect();
        let (x, y, neg) = (
            Statistics::new(&x),
            Statistics::new(&y),
            Statistics::new(&neg),
        );
        assert!(y.r(&x) <= 1.0);
        assert!((y.r(&x) - 1.0).abs() < 1e-12);
        assert!(neg.r(&x) >= -1.0);
        assert!((neg.r(&x) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_nan() {
        let empty = Statistics::new(&[]);
        assert!(empty.mean().is_nan());
        assert!(empty.variance().is_nan());
        assert!(empty.min().is_nan());
        assert!(empty.median().is_nan());
        assert!(empty.r(&empty).is_nan());
    }

    #[test]
    fn test_single_value_variance_is_nan() {
        let one = Statistics::new(&[4.0]);
        assert_eq!(one.mean(), 4.0);
        assert!(one.variance().is_nan());
    }

    #[test]
    fn test_mismatched_lengths() {
        let a = Statistics::new(&[1.0, 2.0, 3.0]);
        let b = Statistics::new(&[1.0, 2.0]);
        assert!(a.covariance(&b).is_nan());
        assert!(a.r(&b).is_nan());
        assert!(a.slope(&b).is_nan());
        assert!(a.residuals(&b).is_empty());
    }

    #[test]
    fn test_zero_variance_is_nan() {
        let flat = Statistics::new(&[2.0, 2.0, 2.0]);
        let x = Statistics::new(&[1.0, 2.0, 3.0]);
        assert!(flat.r(&x).is_nan());
        assert!(x.slope(&flat).is_nan());
        assert_eq!(flat.slope(&x), 0.0);
    }
}
