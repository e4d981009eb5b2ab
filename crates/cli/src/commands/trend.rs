//! `trend` subcommand

use super::{check_summary, collect_into, file_sink, RunContext};
use crate::output::{print_success, print_summary, print_trends, OutputFormat};
use advisor_lib::{CollectingSink, TeeSink, TrendStrategyKind};
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;

/// Report usage trends and headroom sizing per container
pub async fn run_trend(
    ctx: &RunContext,
    strategy: Option<TrendStrategyKind>,
    lookback_hours: Option<i64>,
    step_secs: Option<i64>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(hours) = lookback_hours {
        config.trend.lookback_hours = hours;
    }
    if let Some(step) = step_secs {
        config.trend.step_secs = step;
    }
    let strategy = strategy.unwrap_or(config.trend.strategy);

    let advisor = ctx.advisor(config).await?;
    let now = Utc::now();

    let (collected, summary, written) = match output {
        Some(path) => {
            let tee = TeeSink::new(CollectingSink::new(), file_sink(&path, "trend"));
            let (tee, summary) =
                collect_into(tee, |sink| advisor.run_trend(strategy, now, sink)).await?;
            let (collected, file) = tee.into_parts();
            (collected, summary, Some(file.path().to_path_buf()))
        }
        None => {
            let (collected, summary) = collect_into(CollectingSink::new(), |sink| {
                advisor.run_trend(strategy, now, sink)
            })
            .await?;
            (collected, summary, None)
        }
    };

    print_trends(&collected.trends, format)?;
    print_summary(&summary);
    if let Some(path) = written {
        print_success(&format!("Report saved to {}", path.display()));
    }

    check_summary(&summary)
}
