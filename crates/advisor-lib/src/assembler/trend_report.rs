//! Per-container usage trend report

use super::{Advisor, RunSummary};
use crate::config::render_query;
use crate::error::{AdvisorError, Result};
use crate::models::{deployment_from_pod, AggregateMetrics, EntityKey, TimeSeries, TrendRecord};
use crate::sink::SharedSink;
use crate::sizing::headroom_sizing;
use crate::source::QueryRange;
use crate::trend::TrendStrategyKind;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

const MILLICORES_PER_CORE: f64 = 1000.0;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Default)]
struct EntitySeries {
    cpu_millicores: Vec<f64>,
    memory_mib: Vec<f64>,
}

fn scaled(series: &TimeSeries, scale: f64) -> impl Iterator<Item = f64> + '_ {
    series
        .points
        .iter()
        .map(move |(_, v)| v * scale)
        .filter(|v| v.is_finite())
}

/// Group CPU series by entity; each key found here becomes one record
fn group_cpu(series: &[TimeSeries]) -> BTreeMap<EntityKey, EntitySeries> {
    let mut groups: BTreeMap<EntityKey, EntitySeries> = BTreeMap::new();
    for s in series {
        groups
            .entry(EntityKey::from_labels(&s.labels))
            .or_default()
            .cpu_millicores
            .extend(scaled(s, MILLICORES_PER_CORE));
    }
    groups
}

/// Attach memory series to the CPU groups; returns how many had no CPU series
fn attach_memory(groups: &mut BTreeMap<EntityKey, EntitySeries>, series: &[TimeSeries]) -> usize {
    let mut unmatched = 0;
    for s in series {
        match groups.get_mut(&EntityKey::from_labels(&s.labels)) {
            Some(entity) => entity.memory_mib.extend(scaled(s, 1.0 / BYTES_PER_MIB)),
            None => unmatched += 1,
        }
    }
    unmatched
}

impl Advisor {
    /// Produce one trend record per container, ordered by entity key
    ///
    /// The range ends at `now` and reaches back the configured lookback.
    /// Either range query failing fails the whole report.
    pub async fn run_trend(
        &self,
        strategy: TrendStrategyKind,
        now: DateTime<Utc>,
        sink: SharedSink,
    ) -> Result<RunSummary> {
        let namespaces: Vec<String> = self.namespaces().map(str::to_string).collect();
        self.logger.log_run_started("trend", &namespaces, "sequential");

        let settings = &self.config.trend;
        let range = QueryRange::ending_at(
            now,
            Duration::hours(settings.lookback_hours),
            Duration::seconds(settings.step_secs),
        );
        let alternation = namespaces.join("|");
        let vars = [("namespaces", alternation.as_str())];

        let cpu = self
            .source
            .range_query(&render_query(&self.config.queries.cpu_range, &vars), range)
            .await?;
        let memory = self
            .source
            .range_query(&render_query(&self.config.queries.memory_range, &vars), range)
            .await?;

        debug!(
            cpu_series = cpu.len(),
            memory_series = memory.len(),
            expected_points = range.expected_points(),
            "Fetched usage series"
        );

        let mut groups = group_cpu(&cpu);
        let memory_only = attach_memory(&mut groups, &memory);
        if memory_only > 0 {
            debug!(series = memory_only, "Dropped memory series without CPU usage");
        }

        let analyzer = strategy.build();
        let date = now.format("%Y-%m-%d").to_string();
        let mut summary = RunSummary {
            namespaces: namespaces.len(),
            attempted: groups.len(),
            ..Default::default()
        };

        for (key, series) in groups {
            if key.namespace.is_empty() || key.workload.is_empty() {
                let error = AdvisorError::Parse("series without namespace or pod label".to_string());
                self.logger
                    .log_skip(&key.namespace, &key.to_string(), &error.to_string());
                self.metrics.inc_entities_skipped();
                summary.record_skip(&key.namespace, &key.to_string(), &error);
                continue;
            }

            let cpu = AggregateMetrics::usage(&series.cpu_millicores);
            let memory = AggregateMetrics::usage(&series.memory_mib);
            let trend = analyzer.analyze(&series.cpu_millicores);
            let sizing = headroom_sizing(
                cpu.avg_value,
                cpu.max_value,
                memory.avg_value,
                memory.max_value,
                trend.label,
            );

            let record = TrendRecord {
                namespace: key.namespace.clone(),
                deployment: deployment_from_pod(&key.workload),
                container: key.container.clone(),
                trend: trend.label,
                slope: trend.slope,
                strategy: trend.strategy.to_string(),
                cpu_request_millicores: sizing.cpu_request_millicores,
                cpu_limit_millicores: sizing.cpu_limit_millicores,
                memory_request_mib: sizing.memory_request_mib,
                memory_limit_mib: sizing.memory_limit_mib,
                date: date.clone(),
                avg_cpu_millicores: cpu.avg_value,
                max_cpu_millicores: cpu.max_value,
                avg_memory_mib: memory.avg_value,
                max_memory_mib: memory.max_value,
            };

            self.logger.log_trend(&record);
            sink.lock().await.write_trend(record).await?;
            self.metrics.inc_records_emitted("trend");
            summary.emitted += 1;
        }

        sink.lock().await.finish().await?;
        self.finish_run(&summary);
        Ok(summary)
    }
}
