//! Metrics source abstraction
//!
//! The engine only needs three read-only calls from a metrics backend. The
//! Prometheus HTTP API implementation lives in [`prometheus`].

mod prometheus;

pub use prometheus::{PrometheusClient, PrometheusConfig, DEFAULT_QUERY_TIMEOUT};

use crate::error::Result;
use crate::models::{MetricSample, TimeSeries};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Time range and resolution for a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

impl QueryRange {
    /// Range ending at `end` and reaching `lookback` into the past
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration, step: Duration) -> Self {
        Self {
            start: end - lookback,
            end,
            step,
        }
    }

    /// Expected number of points for a gapless series
    pub fn expected_points(&self) -> i64 {
        let step = self.step.num_seconds().max(1);
        (self.end - self.start).num_seconds() / step + 1
    }
}

/// Read-only access to a metrics backend
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluate an expression at the current instant
    async fn instant_query(&self, expr: &str) -> Result<Vec<MetricSample>>;

    /// Evaluate an expression over a time range
    async fn range_query(&self, expr: &str, range: QueryRange) -> Result<Vec<TimeSeries>>;

    /// List the known values of a label
    async fn label_values(&self, label: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_range_points() {
        let end = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let range = QueryRange::ending_at(end, Duration::days(7), Duration::hours(1));
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(range.expected_points(), 169);
    }
}
