//! Trend analysis over ordered usage series
//!
//! Two strategies are provided and kept separate because they disagree on
//! the same input:
//! - [`RegressionTrend`]: least-squares slope gated by series variance
//! - [`DeltaTrend`]: first-versus-last comparison against a fixed threshold
//!
//! Every [`TrendResult`] names the strategy that produced it.

mod delta;
mod regression;

pub use delta::{DeltaTrend, DELTA_MIN_SAMPLES, DELTA_THRESHOLD};
pub use regression::{
    linear_regression_slope, population_variance, RegressionTrend, REGRESSION_MIN_SAMPLES,
    SLOPE_THRESHOLD, VARIANCE_THRESHOLD,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a usage series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendLabel {
    Rising,
    Falling,
    Stable,
    InsufficientData,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Rising => "RISING",
            TrendLabel::Falling => "FALLING",
            TrendLabel::Stable => "STABLE",
            TrendLabel::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a trend analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendResult {
    pub label: TrendLabel,
    /// Zero when the label is `InsufficientData`
    pub slope: f64,
    /// Name of the strategy that produced the label
    pub strategy: &'static str,
}

impl TrendResult {
    pub fn insufficient(strategy: &'static str) -> Self {
        Self {
            label: TrendLabel::InsufficientData,
            slope: 0.0,
            strategy,
        }
    }
}

/// A named way of classifying an ordered series (oldest first)
pub trait TrendStrategy: Send + Sync {
    /// Strategy name reported alongside every label
    fn name(&self) -> &'static str;

    /// Classify the series
    fn analyze(&self, values: &[f64]) -> TrendResult;
}

/// Selectable trend strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStrategyKind {
    /// Least-squares regression with a variance gate
    #[default]
    Regression,
    /// Two-point delta used by the lower-fidelity daily report
    Delta,
}

impl TrendStrategyKind {
    /// Instantiate the strategy with its standard thresholds
    pub fn build(self) -> Box<dyn TrendStrategy> {
        match self {
            TrendStrategyKind::Regression => Box::new(RegressionTrend::default()),
            TrendStrategyKind::Delta => Box::new(DeltaTrend::default()),
        }
    }
}

impl FromStr for TrendStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regression" => Ok(TrendStrategyKind::Regression),
            "delta" => Ok(TrendStrategyKind::Delta),
            other => Err(format!("unknown trend strategy: {}", other)),
        }
    }
}
