//! Metric aggregation
//!
//! Reduces the raw samples or series of one entity into scalar summaries.
//! The per-method weight table is an injected value so alternate tables can
//! be used without touching process-wide state.

use crate::models::MetricSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight used when a sample's label has no entry in the table
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Label carrying the HTTP method on request-rate samples
pub const DEFAULT_WEIGHT_LABEL: &str = "method";

/// Immutable lookup from a label value (e.g. HTTP method) to a cost weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodWeights {
    /// Label the weight is keyed by
    #[serde(default = "default_label")]
    pub label: String,
    /// Weight per label value
    #[serde(default = "default_table")]
    pub weights: BTreeMap<String, f64>,
    /// Fallback for unknown or missing label values
    #[serde(default = "default_weight")]
    pub default_weight: f64,
}

fn default_label() -> String {
    DEFAULT_WEIGHT_LABEL.to_string()
}

fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

fn default_table() -> BTreeMap<String, f64> {
    [
        ("GET", 1.0),
        ("POST", 2.0),
        ("PUT", 2.0),
        ("DELETE", 2.0),
        ("PATCH", 2.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for MethodWeights {
    fn default() -> Self {
        Self {
            label: default_label(),
            weights: default_table(),
            default_weight: default_weight(),
        }
    }
}

impl MethodWeights {
    /// Build a table keyed by `label` from explicit entries
    pub fn new<I, K>(label: impl Into<String>, entries: I, default_weight: f64) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            label: label.into(),
            weights: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            default_weight,
        }
    }

    /// Resolve the weight for one label value
    pub fn weight_of(&self, value: Option<&str>) -> f64 {
        value
            .and_then(|v| self.lookup(v))
            .unwrap_or(self.default_weight)
    }

    /// Exact match first, then case-insensitive
    fn lookup(&self, value: &str) -> Option<f64> {
        self.weights.get(value).copied().or_else(|| {
            self.weights
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(value))
                .map(|(_, w)| *w)
        })
    }

    /// Sum of `value × weight` over all samples; empty input yields 0
    pub fn weighted_sum(&self, samples: &[MetricSample]) -> f64 {
        weighted_sum(
            samples,
            |v| self.lookup(v),
            &self.label,
            self.default_weight,
        )
    }
}

/// Sum of `value × weight` where the weight is resolved from `label`
///
/// `weight_of` returns `None` for unresolved label values, which then fall
/// back to `default_weight`. Samples without the label also use the default.
/// NaN and infinite samples carry no traffic and are left out of the sum.
pub fn weighted_sum<F>(
    samples: &[MetricSample],
    weight_of: F,
    label: &str,
    default_weight: f64,
) -> f64
where
    F: Fn(&str) -> Option<f64>,
{
    samples
        .iter()
        .filter(|s| s.value.is_finite())
        .map(|s| {
            let weight = s
                .label(label)
                .and_then(&weight_of)
                .unwrap_or(default_weight);
            s.value * weight
        })
        .sum()
}

/// Average and maximum of a series; empty input yields `(0, 0)`
pub fn average_and_max(series: &[f64]) -> (f64, f64) {
    if series.is_empty() {
        return (0.0, 0.0);
    }
    let total: f64 = series.iter().sum();
    let max = series.iter().copied().fold(series[0], f64::max);
    (total / series.len() as f64, max)
}

/// Value of the first sample, or 0 when the query returned nothing
///
/// Quantiles are computed by the metrics source; an empty result means no
/// requests were observed.
pub fn first_scalar(samples: &[MetricSample]) -> f64 {
    samples.first().map(|s| s.value).unwrap_or(0.0)
}
