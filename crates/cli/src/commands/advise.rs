//! `advise` subcommand

use super::{check_summary, collect_into, file_sink, RunContext};
use crate::output::{print_advice, print_success, print_summary, OutputFormat};
use advisor_lib::{CollectingSink, ExecutionMode, TeeSink};
use anyhow::Result;
use std::path::PathBuf;

/// Recommend replicas and resources for every service in the namespaces
pub async fn run_advise(
    ctx: &RunContext,
    parallel: bool,
    concurrency: Option<usize>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(c) = concurrency {
        config.concurrency = c;
    }
    let mode = if parallel {
        ExecutionMode::parallel(config.concurrency)
    } else {
        ExecutionMode::Sequential
    };

    let advisor = ctx.advisor(config).await?;

    let (collected, summary, written) = match output {
        Some(path) => {
            let tee = TeeSink::new(CollectingSink::new(), file_sink(&path, "advice"));
            let (tee, summary) =
                collect_into(tee, |sink| advisor.run_advice(mode, sink)).await?;
            let (collected, file) = tee.into_parts();
            (collected, summary, Some(file.path().to_path_buf()))
        }
        None => {
            let (collected, summary) =
                collect_into(CollectingSink::new(), |sink| advisor.run_advice(mode, sink))
                    .await?;
            (collected, summary, None)
        }
    };

    print_advice(&collected.sorted_advice(), format)?;
    print_summary(&summary);
    if let Some(path) = written {
        print_success(&format!("Report saved to {}", path.display()));
    }

    check_summary(&summary)
}
