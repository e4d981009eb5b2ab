//! Recommendation assembly
//!
//! Walks the configured namespaces, pulls metrics for every entity, and hands
//! finished records to a [`ReportSink`](crate::sink::ReportSink). A failed
//! query skips only the entity it belongs to; sink failures abort the run.

mod advice;
mod trend_report;


pub use advice::workload_from_service;

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, Result};
use crate::inventory::InventoryProvider;
use crate::observability::{AdvisorMetrics, StructuredLogger};
use crate::source::MetricsSource;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// How services are processed within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One service at a time, in discovery order
    Sequential,
    /// Up to `concurrency` services in flight; output order is unspecified
    Parallel { concurrency: usize },
}

impl ExecutionMode {
    pub fn parallel(concurrency: usize) -> Self {
        ExecutionMode::Parallel {
            concurrency: concurrency.max(1),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Parallel { concurrency } => write!(f, "parallel({})", concurrency),
        }
    }
}

/// An entity left out of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntity {
    pub namespace: String,
    pub entity: String,
    pub error: String,
}

/// Outcome counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub namespaces: usize,
    pub attempted: usize,
    pub emitted: usize,
    pub skipped: Vec<SkippedEntity>,
}

impl RunSummary {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True when every attempted entity produced a record
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn record_skip(&mut self, namespace: &str, entity: &str, error: &AdvisorError) {
        self.skipped.push(SkippedEntity {
            namespace: namespace.to_string(),
            entity: entity.to_string(),
            error: error.to_string(),
        });
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} entities reported across {} namespace(s), {} skipped",
            self.emitted,
            self.attempted,
            self.namespaces,
            self.skipped.len()
        )
    }
}

/// Orchestrates metric retrieval, aggregation, sizing and decisions
///
/// Cheap to clone; the metrics source and inventory are shared read-only.
#[derive(Clone)]
pub struct Advisor {
    source: Arc<dyn MetricsSource>,
    inventory: Arc<dyn InventoryProvider>,
    config: Arc<AdvisorConfig>,
    logger: StructuredLogger,
    metrics: AdvisorMetrics,
}

impl Advisor {
    /// Build an advisor; fails when the configuration cannot drive a run
    pub fn new(
        config: AdvisorConfig,
        source: Arc<dyn MetricsSource>,
        inventory: Arc<dyn InventoryProvider>,
        logger: StructuredLogger,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            inventory,
            config: Arc::new(config),
            logger,
            metrics: AdvisorMetrics::new(),
        })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.config
            .namespaces
            .iter()
            .map(|ns| ns.trim())
            .filter(|ns| !ns.is_empty())
    }

    fn finish_run(&self, summary: &RunSummary) {
        self.logger.log_run_summary(
            summary.namespaces,
            summary.attempted,
            summary.emitted,
            summary.skipped_count(),
        );
        self.metrics
            .set_last_run_timestamp(chrono::Utc::now().timestamp());
    }
}
