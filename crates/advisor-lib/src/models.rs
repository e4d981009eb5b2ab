//! Core data models for the advisor

use crate::aggregator::average_and_max;
use crate::decision::{ConfidenceLevel, Decision, RiskLevel};
use crate::trend::TrendLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label set attached to a sample or series
pub type Labels = BTreeMap<String, String>;

/// One value returned by an instant query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub labels: Labels,
    pub value: f64,
}

impl MetricSample {
    pub fn new(labels: Labels, value: f64) -> Self {
        Self { labels, value }
    }

    /// Look up a label value
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// One series returned by a range query, oldest point first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Labels,
    pub points: Vec<(i64, f64)>,
}

impl TimeSeries {
    pub fn new(labels: Labels, points: Vec<(i64, f64)>) -> Self {
        Self { labels, points }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Values in timestamp order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }
}

/// Identity of one aggregation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub namespace: String,
    /// Pod name or service identifier
    pub workload: String,
    pub container: String,
}

impl EntityKey {
    pub fn new(
        namespace: impl Into<String>,
        workload: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            workload: workload.into(),
            container: container.into(),
        }
    }

    /// Build a key from the `namespace`, `pod` and `container` labels of a series
    pub fn from_labels(labels: &Labels) -> Self {
        let get = |name: &str| labels.get(name).cloned().unwrap_or_default();
        Self::new(get("namespace"), get("pod"), get("container"))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.container.is_empty() {
            write!(f, "{}/{}", self.namespace, self.workload)
        } else {
            write!(f, "{}/{}/{}", self.namespace, self.workload, self.container)
        }
    }
}

/// Scalar summaries for one entity over the query window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub weighted_rps: f64,
    pub p95_latency_ms: f64,
    pub avg_value: f64,
    pub max_value: f64,
}

impl AggregateMetrics {
    /// Request rate and latency of a service; NaN, infinite or negative
    /// inputs mean nothing was observed and count as 0
    pub fn traffic(weighted_rps: f64, p95_latency_ms: f64) -> Self {
        Self {
            weighted_rps: observed(weighted_rps),
            p95_latency_ms: observed(p95_latency_ms),
            ..Default::default()
        }
    }

    /// Average and peak of a usage series
    pub fn usage(series: &[f64]) -> Self {
        let (avg_value, max_value) = average_and_max(series);
        Self {
            avg_value,
            max_value,
            ..Default::default()
        }
    }
}

fn observed(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Final per-service recommendation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceRecord {
    pub namespace: String,
    pub service: String,
    pub weighted_rps: f64,
    pub p95_latency_ms: f64,
    pub cpu_request_millicores: u32,
    pub cpu_limit_millicores: u32,
    pub memory_request_mib: u32,
    pub memory_limit_mib: u32,
    pub min_replicas: u32,
    pub recommended_replicas: u32,
    pub decision: Decision,
    pub risk: RiskLevel,
    pub confidence: ConfidenceLevel,
    pub reason: String,
    pub sizing_strategy: String,
    pub metrics_window: String,
    pub generated_at: String,
}

impl AdviceRecord {
    /// Column headers in field order
    pub const COLUMNS: [&'static str; 17] = [
        "namespace",
        "service",
        "weighted_rps",
        "p95_latency_ms",
        "cpu_request_m",
        "cpu_limit_m",
        "memory_request_mi",
        "memory_limit_mi",
        "min_replicas",
        "recommended_replicas",
        "decision",
        "risk",
        "confidence",
        "reason",
        "sizing_strategy",
        "metrics_window",
        "generated_at",
    ];

    /// The record as an ordered field tuple matching [`Self::COLUMNS`]
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.namespace.clone(),
            self.service.clone(),
            format!("{:.2}", self.weighted_rps),
            format!("{:.1}", self.p95_latency_ms),
            self.cpu_request_millicores.to_string(),
            self.cpu_limit_millicores.to_string(),
            self.memory_request_mib.to_string(),
            self.memory_limit_mib.to_string(),
            self.min_replicas.to_string(),
            self.recommended_replicas.to_string(),
            self.decision.to_string(),
            self.risk.to_string(),
            self.confidence.to_string(),
            self.reason.clone(),
            self.sizing_strategy.clone(),
            self.metrics_window.clone(),
            self.generated_at.clone(),
        ]
    }
}

/// Per-container usage trend row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub namespace: String,
    pub deployment: String,
    pub container: String,
    pub trend: TrendLabel,
    pub slope: f64,
    pub strategy: String,
    pub cpu_request_millicores: u32,
    pub cpu_limit_millicores: u32,
    pub memory_request_mib: u32,
    pub memory_limit_mib: u32,
    pub date: String,
    pub avg_cpu_millicores: f64,
    pub max_cpu_millicores: f64,
    pub avg_memory_mib: f64,
    pub max_memory_mib: f64,
}

/// Derive a deployment name from a pod name
///
/// `checkout-7f9cd5b477-abc12` becomes `checkout`. Names with fewer than two
/// dashes are returned unchanged.
pub fn deployment_from_pod(pod: &str) -> String {
    if let Some(last) = pod.rfind('-') {
        if let Some(second) = pod[..last].rfind('-') {
            if second > 0 {
                return pod[..second].to_string();
            }
        }
    }
    pod.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_from_pod() {
        assert_eq!(deployment_from_pod("checkout-7f9cd5b477-abc12"), "checkout");
        assert_eq!(
            deployment_from_pod("order-api-7f9cd5b477-abc12"),
            "order-api"
        );
        assert_eq!(deployment_from_pod("standalone"), "standalone");
        assert_eq!(deployment_from_pod("one-dash"), "one-dash");
    }

    #[test]
    fn test_aggregate_traffic_is_non_negative() {
        let metrics = AggregateMetrics::traffic(f64::NAN, -3.0);
        assert_eq!(metrics.weighted_rps, 0.0);
        assert_eq!(metrics.p95_latency_ms, 0.0);

        let metrics = AggregateMetrics::traffic(42.5, 180.0);
        assert_eq!(metrics.weighted_rps, 42.5);
        assert_eq!(metrics.p95_latency_ms, 180.0);
    }

    #[test]
    fn test_aggregate_usage() {
        let metrics = AggregateMetrics::usage(&[10.0, 30.0, 20.0]);
        assert_eq!(metrics.avg_value, 20.0);
        assert_eq!(metrics.max_value, 30.0);
        assert_eq!(AggregateMetrics::usage(&[]), AggregateMetrics::default());
    }

    #[test]
    fn test_entity_key_value_equality() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(EntityKey::new("prod", "api-1", "app"), 1);
        let lookup = EntityKey::new("prod".to_string(), "api-1".to_string(), "app".to_string());
        assert_eq!(map.get(&lookup), Some(&1));
    }

    #[test]
    fn test_entity_key_from_labels() {
        let mut labels = Labels::new();
        labels.insert("namespace".into(), "prod".into());
        labels.insert("pod".into(), "api-5d8c7-x2x9q".into());
        labels.insert("container".into(), "app".into());

        let key = EntityKey::from_labels(&labels);
        assert_eq!(key, EntityKey::new("prod", "api-5d8c7-x2x9q", "app"));
        assert_eq!(key.to_string(), "prod/api-5d8c7-x2x9q/app");
    }

    #[test]
    fn test_series_values_in_order() {
        let series = TimeSeries::new(Labels::new(), vec![(1, 3.0), (2, 4.0), (3, 5.0)]);
        assert_eq!(series.values(), vec![3.0, 4.0, 5.0]);
    }
}
