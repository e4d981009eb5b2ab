//! Workload resource advisor library
//!
//! This crate provides the core functionality for:
//! - Metric retrieval from a Prometheus-compatible source
//! - Weighted aggregation and trend analysis
//! - Replica decisions and resource sizing
//! - Report assembly in sequential or bounded-parallel mode
//! - Observability (metrics and structured logging)

pub mod aggregator;
pub mod assembler;
pub mod config;
pub mod decision;
pub mod error;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod sink;
pub mod sizing;
pub mod source;
pub mod trend;

pub use aggregator::MethodWeights;
pub use assembler::{Advisor, ExecutionMode, RunSummary, SkippedEntity};
pub use config::AdvisorConfig;
pub use decision::{decide, ConfidenceLevel, Decision, DecisionResult, RiskLevel};
pub use error::{AdvisorError, Result};
pub use inventory::{InventoryProvider, StaticInventory};
pub use models::*;
pub use observability::{AdvisorMetrics, StructuredLogger};
pub use sink::{CollectingSink, JsonFileSink, ReportSink, SharedSink, TeeSink};
pub use sizing::{ResourceSizing, SizingCoefficients, SizingStrategy};
pub use source::{MetricsSource, PrometheusClient, PrometheusConfig, QueryRange};
pub use trend::{TrendLabel, TrendResult, TrendStrategy, TrendStrategyKind};
