//! Workload Resource Advisor CLI
//!
//! A command-line tool that reads service telemetry from Prometheus and
//! recommends replica counts, resource requests and limits.

mod commands;
mod config;
mod inventory;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{advise, trend};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Workload Resource Advisor CLI
#[derive(Parser)]
#[command(name = "k8s-advisor")]
#[command(author, version, about = "Replica and resource advisor for Kubernetes workloads", long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON); advisor.yaml is used when present
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Prometheus base URL (can also be set via ADVISOR_PROMETHEUS_URL env var)
    #[arg(long, env = "ADVISOR_PROMETHEUS_URL", global = true)]
    pub prometheus_url: Option<String>,

    /// Namespace to analyze; repeat or comma-separate for several
    #[arg(long, short, value_delimiter = ',', global = true)]
    pub namespace: Vec<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Write advisor metrics in Prometheus text format to this file
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    /// Read replica floors from the cluster (HPA minReplicas, else Deployment replicas)
    #[arg(long, global = true)]
    pub cluster_inventory: bool,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recommend replicas and resources per service
    Advise {
        /// Process services concurrently
        #[arg(long)]
        parallel: bool,

        /// Maximum services in flight with --parallel (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Also write the report as JSON (a directory gets a timestamped file)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Report per-container usage trends and sizing
    Trend {
        /// Trend strategy (regression, delta)
        #[arg(long)]
        strategy: Option<advisor_lib::TrendStrategyKind>,

        /// How far back to look, in hours (overrides config)
        #[arg(long)]
        lookback_hours: Option<i64>,

        /// Range query resolution, in seconds (overrides config)
        #[arg(long)]
        step_secs: Option<i64>,

        /// Also write the report as JSON (a directory gets a timestamped file)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let ctx = commands::RunContext::from_cli(&cli)?;

    let outcome = match cli.command {
        Commands::Advise {
            parallel,
            concurrency,
            output,
        } => advise::run_advise(&ctx, parallel, concurrency, output, cli.format).await,
        Commands::Trend {
            strategy,
            lookback_hours,
            step_secs,
            output,
        } => {
            trend::run_trend(&ctx, strategy, lookback_hours, step_secs, output, cli.format).await
        }
    };

    if let Some(path) = &cli.metrics_file {
        commands::write_metrics_file(path)?;
    }

    outcome
}
