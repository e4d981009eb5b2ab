//! Output formatting utilities

use advisor_lib::{AdviceRecord, Decision, RiskLevel, RunSummary, TrendLabel, TrendRecord};
use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the advice table
#[derive(Tabled)]
struct AdviceRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "RPS")]
    rps: String,
    #[tabled(rename = "P95")]
    latency: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
    #[tabled(rename = "Min")]
    min_replicas: u32,
    #[tabled(rename = "Replicas")]
    replicas: u32,
    #[tabled(rename = "Decision")]
    decision: String,
    #[tabled(rename = "Risk")]
    risk: String,
}

/// Row for the trend table
#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Slope")]
    slope: String,
    #[tabled(rename = "Avg CPU")]
    avg_cpu: String,
    #[tabled(rename = "Max CPU")]
    max_cpu: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
}

/// Print advice records in the requested format
pub fn print_advice(records: &[AdviceRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Table => {
            if records.is_empty() {
                print_warning("No services found");
                return Ok(());
            }

            let rows: Vec<AdviceRow> = records
                .iter()
                .map(|r| AdviceRow {
                    namespace: r.namespace.clone(),
                    service: r.service.clone(),
                    rps: format!("{:.2}", r.weighted_rps),
                    latency: format!("{:.1}ms", r.p95_latency_ms),
                    cpu_request: format_cpu(r.cpu_request_millicores),
                    cpu_limit: format_cpu(r.cpu_limit_millicores),
                    memory_request: format_mib(r.memory_request_mib),
                    memory_limit: format_mib(r.memory_limit_mib),
                    min_replicas: r.min_replicas,
                    replicas: r.recommended_replicas,
                    decision: color_decision(r.decision),
                    risk: color_risk(r.risk),
                })
                .collect();

            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }
    Ok(())
}

/// Print trend records in the requested format
pub fn print_trends(records: &[TrendRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Table => {
            if records.is_empty() {
                print_warning("No containers found");
                return Ok(());
            }

            let rows: Vec<TrendRow> = records
                .iter()
                .map(|r| TrendRow {
                    namespace: r.namespace.clone(),
                    deployment: r.deployment.clone(),
                    container: r.container.clone(),
                    trend: color_trend(r.trend),
                    slope: format!("{:.2}", r.slope),
                    avg_cpu: format!("{:.0}m", r.avg_cpu_millicores),
                    max_cpu: format!("{:.0}m", r.max_cpu_millicores),
                    cpu_request: format_cpu(r.cpu_request_millicores),
                    cpu_limit: format_cpu(r.cpu_limit_millicores),
                    memory_request: format_mib(r.memory_request_mib),
                    memory_limit: format_mib(r.memory_limit_mib),
                })
                .collect();

            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }
    Ok(())
}

/// Print the run outcome to stderr so JSON on stdout stays parseable
pub fn print_summary(summary: &RunSummary) {
    if summary.is_complete() {
        eprintln!("{} {}", "✓".green().bold(), summary);
        return;
    }

    eprintln!("{} {}", "⚠".yellow().bold(), summary);
    for skipped in &summary.skipped {
        eprintln!(
            "  {} {}/{}: {}",
            "-".dimmed(),
            skipped.namespace,
            skipped.entity,
            skipped.error
        );
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: u32) -> String {
    if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format mebibytes as human-readable string
pub fn format_mib(mib: u32) -> String {
    if mib >= 1024 {
        format!("{:.2}Gi", mib as f64 / 1024.0)
    } else {
        format!("{}Mi", mib)
    }
}

pub fn color_decision(decision: Decision) -> String {
    let text = decision.as_str();
    match decision {
        Decision::ScaleOut => text.red().bold().to_string(),
        Decision::Keep => text.green().to_string(),
        Decision::DownsizeSafe => text.cyan().to_string(),
        Decision::NoTraffic => text.dimmed().to_string(),
    }
}

pub fn color_risk(risk: RiskLevel) -> String {
    let text = risk.as_str();
    match risk {
        RiskLevel::High => text.red().to_string(),
        RiskLevel::Medium => text.yellow().to_string(),
        RiskLevel::Low => text.green().to_string(),
    }
}

pub fn color_trend(trend: TrendLabel) -> String {
    let text = trend.as_str();
    match trend {
        TrendLabel::Rising => text.red().to_string(),
        TrendLabel::Falling => text.blue().to_string(),
        TrendLabel::Stable => text.green().to_string(),
        TrendLabel::InsufficientData => text.dimmed().to_string(),
    }
}
