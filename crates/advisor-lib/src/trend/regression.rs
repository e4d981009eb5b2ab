//! Least-squares trend classification
//!
//! Fits `value = slope × i + intercept` over the sample index and classifies
//! the slope, suppressing labels on series whose variance is too small to
//! carry a real trend.

use super::{TrendLabel, TrendResult, TrendStrategy};

/// Minimum samples required for a regression label
pub const REGRESSION_MIN_SAMPLES: usize = 10;

/// Absolute slope (units per step) above which a series is trending
pub const SLOPE_THRESHOLD: f64 = 0.1;

/// Population variance a series must exceed to be labelled as trending
pub const VARIANCE_THRESHOLD: f64 = 10.0;

/// Regression-based trend strategy
#[derive(Debug, Clone)]
pub struct RegressionTrend {
    pub min_samples: usize,
    pub slope_threshold: f64,
    pub variance_threshold: f64,
}

impl Default for RegressionTrend {
    fn default() -> Self {
        Self {
            min_samples: REGRESSION_MIN_SAMPLES,
            slope_threshold: SLOPE_THRESHOLD,
            variance_threshold: VARIANCE_THRESHOLD,
        }
    }
}

impl TrendStrategy for RegressionTrend {
    fn name(&self) -> &'static str {
        "regression"
    }

    fn analyze(&self, values: &[f64]) -> TrendResult {
        if values.len() < self.min_samples {
            return TrendResult::insufficient(self.name());
        }

        let slope = linear_regression_slope(values);
        let variance = population_variance(values);

        let label = if slope > self.slope_threshold && variance > self.variance_threshold {
            TrendLabel::Rising
        } else if slope < -self.slope_threshold && variance > self.variance_threshold {
            TrendLabel::Falling
        } else {
            TrendLabel::Stable
        };

        TrendResult {
            label,
            slope,
            strategy: self.name(),
        }
    }
}

/// Linear regression slope of the values against their index
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Variance about the mean, divided by `n`
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
