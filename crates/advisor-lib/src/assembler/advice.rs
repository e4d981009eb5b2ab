//! Per-service replica and resource advice

use super::{Advisor, ExecutionMode, RunSummary};
use crate::aggregator::first_scalar;
use crate::config::render_query;
use crate::decision::decide;
use crate::error::{AdvisorError, Result};
use crate::models::{AdviceRecord, AggregateMetrics};
use crate::sink::SharedSink;
use crate::sizing::SizingSignal;
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::debug;

const MILLICORES_PER_CORE: f64 = 1000.0;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Entity name recorded when a namespace could not be searched for services
const DISCOVERY_ENTITY: &str = "<service discovery>";

/// Backing workload name of a service identifier
///
/// `shop-checkout-8080@kubernetescrd` in namespace `shop` becomes `checkout`:
/// the provider suffix, the namespace prefix and the trailing port segment
/// are dropped.
pub fn workload_from_service(service: &str, namespace: &str, suffix: &str) -> String {
    let name = service.strip_suffix(suffix).unwrap_or(service);
    let prefix = format!("{}-", namespace);
    let name = name.strip_prefix(&prefix).unwrap_or(name);
    match name.rsplit_once('-') {
        Some((head, _port)) if !head.is_empty() => head.to_string(),
        _ => name.to_string(),
    }
}

/// NaN or infinite usage means no observations in the window
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

enum JobOutcome {
    Emitted,
    Skipped(AdvisorError),
}

impl Advisor {
    /// Produce one advice record per discovered service
    ///
    /// Returns an error only when the sink fails. A failed service discovery
    /// is recorded against every namespace and the report is still finished.
    pub async fn run_advice(&self, mode: ExecutionMode, sink: SharedSink) -> Result<RunSummary> {
        let namespaces: Vec<String> = self.namespaces().map(str::to_string).collect();
        self.logger
            .log_run_started("advice", &namespaces, &mode.to_string());

        let known = match self.source.label_values(&self.config.service_label).await {
            Err(e) if !e.is_entity_scoped() => return Err(e),
            discovered => discovered,
        };

        let mut summary = RunSummary::default();
        let mut jobs = Vec::new();
        for namespace in &namespaces {
            summary.namespaces += 1;
            let known = match &known {
                Ok(values) => values,
                Err(e) => {
                    self.logger
                        .log_skip(namespace, DISCOVERY_ENTITY, &e.to_string());
                    self.metrics.inc_entities_skipped();
                    summary.record_skip(namespace, DISCOVERY_ENTITY, e);
                    continue;
                }
            };
            let services = self.services_in(namespace, known);
            if services.is_empty() {
                self.logger.log_empty_namespace(namespace);
                continue;
            }
            jobs.extend(services.into_iter().map(|s| (namespace.clone(), s)));
        }
        summary.attempted = jobs.len();

        match mode {
            ExecutionMode::Sequential => self.advise_sequential(jobs, &sink, &mut summary).await?,
            ExecutionMode::Parallel { concurrency } => {
                self.advise_parallel(jobs, concurrency, &sink, &mut summary)
                    .await?
            }
        }

        sink.lock().await.finish().await?;
        self.finish_run(&summary);
        Ok(summary)
    }

    /// Services of `namespace` among the discovered label values, sorted
    fn services_in(&self, namespace: &str, known: &[String]) -> Vec<String> {
        let prefix = format!("{}-", namespace);
        let mut services: Vec<String> = known
            .iter()
            .filter(|s| s.ends_with(&self.config.service_suffix) && s.starts_with(&prefix))
            .cloned()
            .collect();
        services.sort();
        services.dedup();
        services
    }

    async fn advise_sequential(
        &self,
        jobs: Vec<(String, String)>,
        sink: &SharedSink,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for (namespace, service) in jobs {
            match self.advise_one(&namespace, &service, sink).await? {
                JobOutcome::Emitted => summary.emitted += 1,
                JobOutcome::Skipped(e) => summary.record_skip(&namespace, &service, &e),
            }
        }
        Ok(())
    }

    async fn advise_parallel(
        &self,
        jobs: Vec<(String, String)>,
        concurrency: usize,
        sink: &SharedSink,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut join_set = JoinSet::new();
        // Names of spawned services, for tasks that die without returning them
        let mut spawned: HashMap<Id, (String, String)> = HashMap::new();

        for (namespace, service) in jobs {
            let advisor = self.clone();
            let semaphore = semaphore.clone();
            let sink = sink.clone();
            let entity = (namespace.clone(), service.clone());
            let handle = join_set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => advisor.advise_one(&namespace, &service, &sink).await,
                    Err(e) => Err(AdvisorError::Query(format!("admission closed: {}", e))),
                };
                (namespace, service, outcome)
            });
            spawned.insert(handle.id(), entity);
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, _, Ok(JobOutcome::Emitted))) => summary.emitted += 1,
                Ok((namespace, service, Ok(JobOutcome::Skipped(e)))) => {
                    summary.record_skip(&namespace, &service, &e)
                }
                Ok((namespace, service, Err(e))) if e.is_entity_scoped() => {
                    summary.record_skip(&namespace, &service, &e)
                }
                Ok((_, _, Err(e))) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    let (namespace, service) = spawned.remove(&e.id()).unwrap_or_default();
                    let error = AdvisorError::Query(format!("service task failed: {}", e));
                    self.logger.log_skip(&namespace, &service, &error.to_string());
                    self.metrics.inc_entities_skipped();
                    summary.record_skip(&namespace, &service, &error);
                }
            }
        }
        Ok(())
    }

    /// Advise one service; entity-scoped failures become a skip
    async fn advise_one(&self, namespace: &str, service: &str, sink: &SharedSink) -> Result<JobOutcome> {
        match self.build_advice(namespace, service).await {
            Ok(record) => {
                self.logger.log_advice(&record);
                sink.lock().await.write_advice(record).await?;
                self.metrics.inc_records_emitted("advice");
                Ok(JobOutcome::Emitted)
            }
            Err(e) if e.is_entity_scoped() => {
                self.logger.log_skip(namespace, service, &e.to_string());
                self.metrics.inc_entities_skipped();
                Ok(JobOutcome::Skipped(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Query, aggregate, size and decide for one service
    pub async fn build_advice(&self, namespace: &str, service: &str) -> Result<AdviceRecord> {
        let config = &self.config;
        let workload = workload_from_service(service, namespace, &config.service_suffix);
        let vars = [
            ("service", service),
            ("namespace", namespace),
            ("workload", workload.as_str()),
            ("window", config.metrics_window.as_str()),
        ];

        let rate_samples = self
            .source
            .instant_query(&render_query(&config.queries.request_rate, &vars))
            .await?;
        let latency_samples = self
            .source
            .instant_query(&render_query(&config.queries.latency_p95, &vars))
            .await?;
        let traffic = AggregateMetrics::traffic(
            config.method_weights.weighted_sum(&rate_samples),
            first_scalar(&latency_samples),
        );

        let strategy = config.sizing_strategy();
        let mut signal = SizingSignal {
            weighted_rps: traffic.weighted_rps,
            ..Default::default()
        };
        if strategy.needs_usage() {
            let cpu = self
                .source
                .instant_query(&render_query(&config.queries.cpu_usage, &vars))
                .await?;
            let memory = self
                .source
                .instant_query(&render_query(&config.queries.memory_usage, &vars))
                .await?;
            signal.avg_cpu_millicores = finite_or_zero(first_scalar(&cpu)) * MILLICORES_PER_CORE;
            signal.avg_memory_mib = finite_or_zero(first_scalar(&memory)) / BYTES_PER_MIB;
        }

        let min_replicas = self.replica_floor(namespace, &workload).await;
        let sizing = strategy.size(&signal);
        let decision = decide(
            traffic.weighted_rps,
            traffic.p95_latency_ms,
            strategy.redundancy_factor(),
            min_replicas,
        );

        debug!(
            namespace = %namespace,
            service = %service,
            workload = %workload,
            rate_series = rate_samples.len(),
            weighted_rps = traffic.weighted_rps,
            p95_latency_ms = traffic.p95_latency_ms,
            "Aggregated service metrics"
        );

        Ok(AdviceRecord {
            namespace: namespace.to_string(),
            service: service.to_string(),
            weighted_rps: traffic.weighted_rps,
            p95_latency_ms: traffic.p95_latency_ms,
            cpu_request_millicores: sizing.cpu_request_millicores,
            cpu_limit_millicores: sizing.cpu_limit_millicores,
            memory_request_mib: sizing.memory_request_mib,
            memory_limit_mib: sizing.memory_limit_mib,
            min_replicas,
            recommended_replicas: decision.recommended_replicas,
            decision: decision.decision,
            risk: decision.risk,
            confidence: decision.confidence,
            reason: decision.reason,
            sizing_strategy: strategy.name().to_string(),
            metrics_window: config.metrics_window.clone(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Inventory floor, falling back to the configured floor on error or silence
    async fn replica_floor(&self, namespace: &str, workload: &str) -> u32 {
        let configured = self.config.min_replicas;
        match self.inventory.min_replicas(namespace, workload).await {
            Ok(Some(floor)) => floor,
            Ok(None) => configured,
            Err(e) => {
                self.logger
                    .log_inventory_fallback(namespace, workload, &e.to_string(), configured);
                self.metrics.inc_inventory_fallbacks();
                configured
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_from_service() {
        assert_eq!(
            workload_from_service("shop-checkout-8080@kubernetescrd", "shop", "@kubernetescrd"),
            "checkout"
        );
        assert_eq!(
            workload_from_service("shop-order-api-http@kubernetescrd", "shop", "@kubernetescrd"),
            "order-api"
        );
        assert_eq!(
            workload_from_service("shop-web@kubernetescrd", "shop", "@kubernetescrd"),
            "web"
        );
        assert_eq!(workload_from_service("plain", "shop", "@kubernetescrd"), "plain");
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(42.5), 42.5);
    }
}
