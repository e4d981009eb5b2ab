//! Advisor configuration
//!
//! Settings come from an optional YAML/JSON file layered under `ADVISOR_*`
//! environment variables. Nested keys use a double underscore, e.g.
//! `ADVISOR_SIZING__CPU_REQUEST_FACTOR=1.5`.

use crate::aggregator::MethodWeights;
use crate::decision::DEFAULT_MIN_REPLICAS;
use crate::error::{AdvisorError, Result};
use crate::sizing::{SizingCoefficients, SizingStrategy};
use crate::source::DEFAULT_QUERY_TIMEOUT;
use crate::trend::TrendStrategyKind;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "advisor.yaml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ADVISOR";

/// Top-level advisor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    /// Namespaces to analyze
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Prometheus base URL
    #[serde(default)]
    pub prometheus_url: String,

    /// Per-query timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Averaging window for traffic queries, e.g. `1d`
    #[serde(default = "default_metrics_window")]
    pub metrics_window: String,

    /// Replica floor when the inventory has no answer
    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,

    /// Maximum services in flight in parallel mode
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Label whose values identify services
    #[serde(default = "default_service_label")]
    pub service_label: String,

    /// Suffix a label value must carry to count as a service
    #[serde(default = "default_service_suffix")]
    pub service_suffix: String,

    /// Request weights by HTTP method
    #[serde(default)]
    pub method_weights: MethodWeights,

    /// Linear sizing coefficients; banded sizing when absent
    #[serde(default)]
    pub sizing: Option<SizingCoefficients>,

    #[serde(default)]
    pub queries: QueryTemplates,

    #[serde(default)]
    pub trend: TrendSettings,
}

/// PromQL templates used by the assembler
///
/// Placeholders: `{service}`, `{namespace}`, `{workload}`, `{window}` and,
/// for the trend queries, `{namespaces}` (a `|`-joined regex alternation).
/// CPU templates must return cores and memory templates bytes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryTemplates {
    pub request_rate: String,
    pub latency_p95: String,
    pub cpu_usage: String,
    pub memory_usage: String,
    pub cpu_range: String,
    pub memory_range: String,
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self {
            request_rate: concat!(
                "avg_over_time(sum by(method)(rate(traefik_service_requests_total",
                "{namespace=\"traefik\",exported_service=\"{service}\"}[5m]))[{window}:1h])"
            )
            .to_string(),
            latency_p95: concat!(
                "histogram_quantile(0.95,sum by(le)(rate(traefik_service_request_duration_seconds_bucket",
                "{namespace=\"traefik\",exported_service=\"{service}\"}[5m]))) * 1000"
            )
            .to_string(),
            cpu_usage: concat!(
                "avg(avg_over_time(sum by(pod)(rate(container_cpu_usage_seconds_total",
                "{namespace=\"{namespace}\",pod=~\"{workload}-.*\",image!=\"\",container!=\"POD\"}[5m]))[{window}:1h]))"
            )
            .to_string(),
            memory_usage: concat!(
                "avg(avg_over_time(sum by(pod)(container_memory_usage_bytes",
                "{namespace=\"{namespace}\",pod=~\"{workload}-.*\",image!=\"\",container!=\"POD\"})[{window}:1h]))"
            )
            .to_string(),
            cpu_range: concat!(
                "sum(rate(container_cpu_usage_seconds_total",
                "{namespace=~\"{namespaces}\",image!=\"\",container!=\"POD\"}[5m])) by (namespace, pod, container)"
            )
            .to_string(),
            memory_range: concat!(
                "avg(container_memory_usage_bytes",
                "{namespace=~\"{namespaces}\",image!=\"\",container!=\"POD\"}) by (namespace, pod, container)"
            )
            .to_string(),
        }
    }
}

/// Substitute `{name}` placeholders in a query template
pub fn render_query(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |query, (name, value)| {
        query.replace(&format!("{{{}}}", name), value)
    })
}

/// Trend report settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    /// How far back the range queries reach, in hours
    pub lookback_hours: i64,
    /// Resolution of the range queries, in seconds
    pub step_secs: i64,
    pub strategy: TrendStrategyKind,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 7 * 24,
            step_secs: 3600,
            strategy: TrendStrategyKind::default(),
        }
    }
}

fn default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT.as_secs()
}

fn default_metrics_window() -> String {
    "1d".to_string()
}

fn default_min_replicas() -> u32 {
    DEFAULT_MIN_REPLICAS
}

fn default_concurrency() -> usize {
    5
}

fn default_service_label() -> String {
    "exported_service".to_string()
}

fn default_service_suffix() -> String {
    "@kubernetescrd".to_string()
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            prometheus_url: String::new(),
            query_timeout_secs: default_query_timeout(),
            metrics_window: default_metrics_window(),
            min_replicas: default_min_replicas(),
            concurrency: default_concurrency(),
            service_label: default_service_label(),
            service_suffix: default_service_suffix(),
            method_weights: MethodWeights::default(),
            sizing: None,
            queries: QueryTemplates::default(),
            trend: TrendSettings::default(),
        }
    }
}

impl AdvisorConfig {
    /// Load configuration from a file and the environment
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// read when present. Environment variables win over file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("namespaces")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Check the settings a run cannot do without
    pub fn validate(&self) -> Result<()> {
        if self.prometheus_url.trim().is_empty() {
            return Err(AdvisorError::Configuration(
                "metrics endpoint must not be empty".to_string(),
            ));
        }
        if self.namespaces.iter().all(|ns| ns.trim().is_empty()) {
            return Err(AdvisorError::Configuration(
                "at least one namespace is required".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(AdvisorError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.metrics_window.trim().is_empty() {
            return Err(AdvisorError::Configuration(
                "metrics window must not be empty".to_string(),
            ));
        }
        if self.trend.lookback_hours <= 0 || self.trend.step_secs <= 0 {
            return Err(AdvisorError::Configuration(
                "trend lookback and step must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Sizing path implied by the presence of the `sizing` section
    pub fn sizing_strategy(&self) -> SizingStrategy {
        SizingStrategy::select(self.sizing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{}", ext))
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AdvisorConfig::default();
        assert_eq!(config.min_replicas, 3);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.metrics_window, "1d");
        assert_eq!(config.service_suffix, "@kubernetescrd");
        assert_eq!(config.trend.lookback_hours, 168);
        assert_eq!(config.sizing_strategy(), SizingStrategy::Banded);
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_config(
            "yaml",
            r#"
namespaces: [shop, payments]
prometheus_url: http://prometheus:9090
min_replicas: 2
sizing:
  cpu_request_factor: 1.5
method_weights:
  weights:
    GET: 1
    POST: 3
trend:
  strategy: delta
"#,
        );

        let config = AdvisorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.namespaces, vec!["shop", "payments"]);
        assert_eq!(config.prometheus_url, "http://prometheus:9090");
        assert_eq!(config.min_replicas, 2);
        assert_eq!(config.method_weights.weight_of(Some("POST")), 3.0);
        assert_eq!(config.method_weights.label, "method");
        assert_eq!(config.trend.strategy, TrendStrategyKind::Delta);
        assert_eq!(config.trend.step_secs, 3600);

        let coefficients = config.sizing.unwrap();
        assert_eq!(coefficients.cpu_request_factor, 1.5);
        assert_eq!(coefficients.mem_limit_factor, 0.0);
        assert_eq!(config.sizing_strategy().name(), "linear");
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_configuration_error() {
        let err = AdvisorConfig::load(Some(Path::new("/nonexistent/advisor.yaml"))).unwrap_err();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_empty_endpoint() {
        let config = AdvisorConfig {
            namespaces: vec!["shop".into()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics endpoint"));
    }

    #[test]
    fn test_validate_rejects_empty_namespaces() {
        let config = AdvisorConfig {
            prometheus_url: "http://prometheus:9090".into(),
            namespaces: vec![" ".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AdvisorError::Configuration(_))
        ));
    }

    #[test]
    fn test_render_query() {
        let templates = QueryTemplates::default();
        let rps = render_query(
            &templates.request_rate,
            &[("service", "shop-api-80@kubernetescrd"), ("window", "1d")],
        );
        assert!(rps.contains("exported_service=\"shop-api-80@kubernetescrd\""));
        assert!(rps.ends_with("[1d:1h])"));
        assert!(!rps.contains("{service}"));

        let cpu = render_query(&templates.cpu_range, &[("namespaces", "shop|payments")]);
        assert!(cpu.contains("namespace=~\"shop|payments\""));
    }
}
