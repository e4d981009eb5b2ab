//! CLI subcommands

pub mod advise;
pub mod trend;

use crate::config::{self, Overrides};
use crate::inventory::KubeInventory;
use crate::Cli;
use advisor_lib::{
    Advisor, AdvisorConfig, AdvisorMetrics, InventoryProvider, JsonFileSink, PrometheusClient,
    PrometheusConfig, ReportSink, RunSummary, SharedSink, StaticInventory, StructuredLogger,
};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Settings shared by every subcommand
pub struct RunContext {
    pub config: AdvisorConfig,
    pub cluster_inventory: bool,
    pub kubeconfig: Option<String>,
}

impl RunContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = config::load(
            cli.config.as_deref(),
            Overrides {
                prometheus_url: cli.prometheus_url.clone(),
                namespaces: cli.namespace.clone(),
            },
        )?;

        Ok(Self {
            config,
            cluster_inventory: cli.cluster_inventory,
            kubeconfig: cli.kubeconfig.clone(),
        })
    }

    /// Wire the metrics source, inventory and logger into an advisor
    pub async fn advisor(&self, config: AdvisorConfig) -> Result<Advisor> {
        config.validate()?;

        let source = PrometheusClient::new(
            PrometheusConfig::new(config.prometheus_url.clone()).with_timeout(config.query_timeout()),
        )?;

        let inventory: Arc<dyn InventoryProvider> = if self.cluster_inventory {
            Arc::new(KubeInventory::connect(self.kubeconfig.as_deref()).await?)
        } else {
            Arc::new(StaticInventory::empty())
        };

        let run_id = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        info!(
            run_id = %run_id,
            prometheus_url = %config.prometheus_url,
            namespaces = %config.namespaces.join(","),
            cluster_inventory = self.cluster_inventory,
            "Advisor configured"
        );

        Ok(Advisor::new(
            config,
            Arc::new(source),
            inventory,
            StructuredLogger::new(run_id),
        )?)
    }
}

/// Run a report into `sink` and hand the sink back once every writer is done
pub async fn collect_into<S, F, Fut>(sink: S, run: F) -> Result<(S, RunSummary)>
where
    S: ReportSink + 'static,
    F: FnOnce(SharedSink) -> Fut,
    Fut: Future<Output = advisor_lib::Result<RunSummary>>,
{
    let owned = Arc::new(Mutex::new(sink));
    let shared: SharedSink = owned.clone();
    let summary = run(shared).await?;

    let sink = Arc::try_unwrap(owned)
        .map_err(|_| anyhow!("report sink still in use after the run"))?
        .into_inner();
    Ok((sink, summary))
}

/// JSON sink for `--output`; a directory gets a timestamped file name
pub fn file_sink(path: &Path, prefix: &str) -> JsonFileSink {
    if path.is_dir() {
        JsonFileSink::timestamped(path, prefix, Utc::now())
    } else {
        JsonFileSink::new(PathBuf::from(path))
    }
}

/// Dump advisor metrics in the Prometheus text format
pub fn write_metrics_file(path: &Path) -> Result<()> {
    let text = AdvisorMetrics::new().encode_text();
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics file {}", path.display()))
}

/// Exit with an error when something failed and nothing was reported
pub fn check_summary(summary: &RunSummary) -> Result<()> {
    if summary.emitted == 0 && !summary.skipped.is_empty() {
        anyhow::bail!("no records produced: {}", summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_lib::{CollectingSink, SkippedEntity};

    #[tokio::test]
    async fn test_collect_into_returns_sink() {
        let (sink, summary) = collect_into(CollectingSink::new(), |_shared| async {
            Ok(RunSummary {
                namespaces: 1,
                ..Default::default()
            })
        })
        .await
        .unwrap();
        assert!(sink.advice.is_empty());
        assert_eq!(summary.namespaces, 1);
    }

    #[test]
    fn test_check_summary() {
        let skip = |entity: &str| SkippedEntity {
            namespace: "shop".to_string(),
            entity: entity.to_string(),
            error: "query error: connection refused".to_string(),
        };

        let failed = RunSummary {
            namespaces: 1,
            attempted: 2,
            emitted: 0,
            skipped: vec![skip("web"), skip("api")],
        };
        assert!(check_summary(&failed).is_err());

        let undiscovered = RunSummary {
            namespaces: 1,
            skipped: vec![skip("<service discovery>")],
            ..Default::default()
        };
        assert!(check_summary(&undiscovered).is_err());

        let partial = RunSummary {
            namespaces: 1,
            attempted: 2,
            emitted: 1,
            skipped: vec![skip("api")],
        };
        assert!(check_summary(&partial).is_ok());
        assert!(check_summary(&RunSummary::default()).is_ok());
    }

    #[test]
    fn test_file_sink_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = file_sink(dir.path(), "advice");
        let name = sink.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("advice-") && name.ends_with(".json"));

        let file = dir.path().join("report.json");
        assert_eq!(file_sink(&file, "advice").path(), file.as_path());
    }
}
