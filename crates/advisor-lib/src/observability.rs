//! Observability infrastructure for the advisor
//!
//! Provides:
//! - Prometheus metrics (query latency, query errors, emitted and skipped entities)
//! - Structured logging of advisor events with tracing

use crate::models::{AdviceRecord, TrendRecord};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for metric query latency (in seconds)
const QUERY_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once); `None` if registration failed
static GLOBAL_METRICS: OnceLock<Option<AdvisorMetricsInner>> = OnceLock::new();

struct AdvisorMetricsInner {
    registry: Registry,
    query_latency_seconds: HistogramVec,
    query_errors: IntCounterVec,
    records_emitted: IntCounterVec,
    entities_skipped: IntCounter,
    inventory_fallbacks: IntCounter,
    last_run_timestamp: IntGauge,
}

impl AdvisorMetricsInner {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let query_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "workload_advisor_query_latency_seconds",
                "Time spent waiting on the metrics source",
            )
            .buckets(QUERY_LATENCY_BUCKETS.to_vec()),
            &["kind"],
        )?;
        let query_errors = IntCounterVec::new(
            Opts::new(
                "workload_advisor_query_errors_total",
                "Metric queries that failed or returned an error status",
            ),
            &["kind"],
        )?;
        let records_emitted = IntCounterVec::new(
            Opts::new(
                "workload_advisor_records_emitted_total",
                "Records handed to the report sink",
            ),
            &["report"],
        )?;
        let entities_skipped = IntCounter::new(
            "workload_advisor_entities_skipped_total",
            "Services or containers skipped because of a query or parse error",
        )?;
        let inventory_fallbacks = IntCounter::new(
            "workload_advisor_inventory_fallbacks_total",
            "Replica floor lookups that fell back to the configured floor",
        )?;
        let last_run_timestamp = IntGauge::new(
            "workload_advisor_last_run_timestamp_seconds",
            "Unix time at which the last run finished",
        )?;

        registry.register(Box::new(query_latency_seconds.clone()))?;
        registry.register(Box::new(query_errors.clone()))?;
        registry.register(Box::new(records_emitted.clone()))?;
        registry.register(Box::new(entities_skipped.clone()))?;
        registry.register(Box::new(inventory_fallbacks.clone()))?;
        registry.register(Box::new(last_run_timestamp.clone()))?;

        Ok(Self {
            registry,
            query_latency_seconds,
            query_errors,
            records_emitted,
            entities_skipped,
            inventory_fallbacks,
            last_run_timestamp,
        })
    }
}

/// Advisor metrics for Prometheus exposition
///
/// A lightweight handle to the process-global metrics. Clones share the
/// same underlying counters.
#[derive(Clone)]
pub struct AdvisorMetrics {
    _private: (),
}

impl Default for AdvisorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match AdvisorMetricsInner::new() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register advisor metrics, metrics disabled");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&AdvisorMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    /// Record how long one metric query took
    pub fn observe_query_latency(&self, kind: &str, duration_secs: f64) {
        if let Some(inner) = self.inner() {
            inner
                .query_latency_seconds
                .with_label_values(&[kind])
                .observe(duration_secs);
        }
    }

    pub fn inc_query_errors(&self, kind: &str) {
        if let Some(inner) = self.inner() {
            inner.query_errors.with_label_values(&[kind]).inc();
        }
    }

    /// Count a record written for `report` (`advice` or `trend`)
    pub fn inc_records_emitted(&self, report: &str) {
        if let Some(inner) = self.inner() {
            inner.records_emitted.with_label_values(&[report]).inc();
        }
    }

    pub fn inc_entities_skipped(&self) {
        if let Some(inner) = self.inner() {
            inner.entities_skipped.inc();
        }
    }

    pub fn inc_inventory_fallbacks(&self) {
        if let Some(inner) = self.inner() {
            inner.inventory_fallbacks.inc();
        }
    }

    pub fn set_last_run_timestamp(&self, unix_secs: i64) {
        if let Some(inner) = self.inner() {
            inner.last_run_timestamp.set(unix_secs);
        }
    }

    /// Render all advisor metrics in the Prometheus text format
    pub fn encode_text(&self) -> String {
        let Some(inner) = self.inner() else {
            return String::new();
        };

        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&inner.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode advisor metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for advisor events
///
/// Every event carries the run identifier so concurrent runs writing to the
/// same log stream can be told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log the start of a run
    pub fn log_run_started(&self, report: &str, namespaces: &[String], mode: &str) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            report = %report,
            namespaces = %namespaces.join(","),
            mode = %mode,
            "Advisor run started"
        );
    }

    /// Log a finished advice record
    pub fn log_advice(&self, record: &AdviceRecord) {
        info!(
            event = "advice_generated",
            run_id = %self.run_id,
            namespace = %record.namespace,
            service = %record.service,
            weighted_rps = record.weighted_rps,
            p95_latency_ms = record.p95_latency_ms,
            decision = %record.decision,
            recommended_replicas = record.recommended_replicas,
            min_replicas = record.min_replicas,
            risk = %record.risk,
            cpu_request_millicores = record.cpu_request_millicores,
            memory_request_mib = record.memory_request_mib,
            sizing_strategy = %record.sizing_strategy,
            "Generated replica recommendation"
        );
    }

    /// Log a finished trend record
    pub fn log_trend(&self, record: &TrendRecord) {
        debug!(
            event = "trend_computed",
            run_id = %self.run_id,
            namespace = %record.namespace,
            deployment = %record.deployment,
            container = %record.container,
            trend = %record.trend,
            slope = record.slope,
            strategy = %record.strategy,
            cpu_request_millicores = record.cpu_request_millicores,
            memory_request_mib = record.memory_request_mib,
            "Computed usage trend"
        );
    }

    /// Log an entity dropped from the report
    pub fn log_skip(&self, namespace: &str, entity: &str, error: &str) {
        warn!(
            event = "entity_skipped",
            run_id = %self.run_id,
            namespace = %namespace,
            entity = %entity,
            error = %error,
            "Skipping entity after metric query failure"
        );
    }

    /// Log a namespace without matching services
    pub fn log_empty_namespace(&self, namespace: &str) {
        warn!(
            event = "namespace_empty",
            run_id = %self.run_id,
            namespace = %namespace,
            "No services found in namespace"
        );
    }

    /// Log an inventory lookup that fell back to the configured floor
    pub fn log_inventory_fallback(&self, namespace: &str, workload: &str, error: &str, floor: u32) {
        warn!(
            event = "inventory_fallback",
            run_id = %self.run_id,
            namespace = %namespace,
            workload = %workload,
            error = %error,
            min_replicas = floor,
            "Replica floor lookup failed, using configured floor"
        );
    }

    /// Log the run outcome
    pub fn log_run_summary(
        &self,
        namespaces: usize,
        attempted: usize,
        emitted: usize,
        skipped: usize,
    ) {
        if skipped == 0 {
            info!(
                event = "run_finished",
                run_id = %self.run_id,
                namespaces = namespaces,
                attempted = attempted,
                emitted = emitted,
                skipped = skipped,
                "Advisor run finished"
            );
        } else {
            warn!(
                event = "run_finished",
                run_id = %self.run_id,
                namespaces = namespaces,
                attempted = attempted,
                emitted = emitted,
                skipped = skipped,
                "Advisor run finished with skipped entities"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisor_metrics_exposition() {
        let metrics = AdvisorMetrics::new();

        metrics.observe_query_latency("instant", 0.02);
        metrics.inc_query_errors("range");
        metrics.inc_records_emitted("advice");
        metrics.inc_entities_skipped();
        metrics.inc_inventory_fallbacks();
        metrics.set_last_run_timestamp(1_709_856_000);

        let text = metrics.encode_text();
        assert!(text.contains("workload_advisor_query_latency_seconds_bucket"));
        assert!(text.contains("workload_advisor_query_errors_total{kind=\"range\"}"));
        assert!(text.contains("workload_advisor_records_emitted_total{report=\"advice\"}"));
        assert!(text.contains("workload_advisor_last_run_timestamp_seconds 1709856000"));
    }

    #[test]
    fn test_handles_share_global_metrics() {
        let a = AdvisorMetrics::new();
        let b = a.clone();
        a.inc_records_emitted("shared-handle");
        assert!(b
            .encode_text()
            .contains("workload_advisor_records_emitted_total{report=\"shared-handle\"} 1"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("run-20240308");
        assert_eq!(logger.run_id(), "run-20240308");
    }
}
