//! Prometheus HTTP API client
//!
//! Speaks the `/api/v1/query`, `/api/v1/query_range` and
//! `/api/v1/label/<name>/values` endpoints and decodes their
//! `{status, data}` envelope.

use super::{MetricsSource, QueryRange};
use crate::error::{AdvisorError, Result};
use crate::models::{Labels, MetricSample, TimeSeries};
use crate::observability::AdvisorMetrics;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Timeout applied to every metric query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the Prometheus API
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Base URL, e.g. `http://prometheus.monitoring:9090`
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl PrometheusConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Prometheus-backed [`MetricsSource`]
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
    metrics: AdvisorMetrics,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultData<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    #[serde(default)]
    metric: Labels,
    #[serde(default)]
    value: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MatrixEntry {
    #[serde(default)]
    metric: Labels,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl PrometheusClient {
    /// Create a new client; fails on an empty or malformed endpoint
    pub fn new(config: PrometheusConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(AdvisorError::Configuration(
                "metrics endpoint must not be empty".to_string(),
            ));
        }

        // Url::join drops the last path segment unless it ends with '/'
        let normalized = format!("{}/", endpoint.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            AdvisorError::Configuration(format!("invalid metrics endpoint {}: {}", endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdvisorError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            metrics: AdvisorMetrics::new(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AdvisorError::Query(format!("invalid path {}: {}", path, e)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// GET an API path and unwrap the `data` member of the envelope
    async fn get_data<T: DeserializeOwned>(&self, kind: &str, url: Url) -> Result<T> {
        let start = Instant::now();
        let outcome = self.fetch(url).await;
        self.metrics
            .observe_query_latency(kind, start.elapsed().as_secs_f64());
        if let Err(e) = &outcome {
            self.metrics.inc_query_errors(kind);
            warn!(kind = %kind, error = %e, "Metric query failed");
        }
        outcome
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "Querying metrics source");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AdvisorError::Query(format!(
                "metrics source returned {}: {}",
                status,
                truncate(&body, 512)
            )));
        }

        decode_envelope(&body)
    }
}

/// Decode a `{status, data}` envelope and return its data
fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| AdvisorError::Query(format!("malformed response body: {}", e)))?;

    if envelope.status != "success" {
        return Err(AdvisorError::Query(format!(
            "query status {}: {} {}",
            envelope.status,
            envelope.error_type.unwrap_or_default(),
            envelope.error.unwrap_or_default()
        )
        .trim_end()
        .to_string()));
    }

    envelope
        .data
        .ok_or_else(|| AdvisorError::Query("response has no data member".to_string()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decode a string-encoded sample value
fn parse_value(raw: &serde_json::Value) -> Result<f64> {
    match raw {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| AdvisorError::Parse(format!("not a number: {:?}", s))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AdvisorError::Parse(format!("not a number: {}", n))),
        other => Err(AdvisorError::Parse(format!("not a number: {}", other))),
    }
}

fn parse_timestamp(raw: &serde_json::Value) -> Result<i64> {
    raw.as_f64()
        .map(|ts| ts as i64)
        .ok_or_else(|| AdvisorError::Parse(format!("not a timestamp: {}", raw)))
}

fn decode_vector(entries: Vec<VectorEntry>) -> Result<Vec<MetricSample>> {
    let mut samples = Vec::with_capacity(entries.len());
    for entry in entries {
        // Entries without a [timestamp, value] pair carry no sample
        let Some(raw) = entry.value.get(1) else {
            continue;
        };
        samples.push(MetricSample::new(entry.metric, parse_value(raw)?));
    }
    Ok(samples)
}

fn decode_matrix(entries: Vec<MatrixEntry>) -> Result<Vec<TimeSeries>> {
    let mut series = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut points = Vec::with_capacity(entry.values.len());
        for pair in &entry.values {
            if let [ts, value] = pair.as_slice() {
                points.push((parse_timestamp(ts)?, parse_value(value)?));
            }
        }
        points.sort_by_key(|(ts, _)| *ts);
        points.dedup_by_key(|(ts, _)| *ts);
        series.push(TimeSeries::new(entry.metric, points));
    }
    Ok(series)
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn instant_query(&self, expr: &str) -> Result<Vec<MetricSample>> {
        let url = self.endpoint("api/v1/query", &[("query", expr.to_string())])?;
        let data: ResultData<VectorEntry> = self.get_data("instant", url).await?;
        decode_vector(data.result)
    }

    async fn range_query(&self, expr: &str, range: QueryRange) -> Result<Vec<TimeSeries>> {
        let url = self.endpoint(
            "api/v1/query_range",
            &[
                ("query", expr.to_string()),
                ("start", range.start.timestamp().to_string()),
                ("end", range.end.timestamp().to_string()),
                ("step", range.step.num_seconds().max(1).to_string()),
            ],
        )?;
        let data: ResultData<MatrixEntry> = self.get_data("range", url).await?;
        decode_matrix(data.result)
    }

    async fn label_values(&self, label: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("api/v1/label/{}/values", label), &[])?;
        self.get_data("label_values", url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    const VECTOR_BODY: &str = r#"{
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [
                {"metric": {"method": "GET"}, "value": [1709856000.123, "10"]},
                {"metric": {"method": "POST"}, "value": [1709856000.123, "5.5"]}
            ]
        }
    }"#;

    fn client_for(server: &mockito::ServerGuard) -> PrometheusClient {
        PrometheusClient::new(PrometheusConfig::new(server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_instant_query_decodes_vector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "sum(up)".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(VECTOR_BODY)
            .create_async()
            .await;

        let samples = client_for(&server).instant_query("sum(up)").await.unwrap();

        mock.assert_async().await;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label("method"), Some("GET"));
        assert_eq!(samples[0].value, 10.0);
        assert_eq!(samples[1].value, 5.5);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
            .create_async()
            .await;

        let samples = client_for(&server).instant_query("absent").await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_query_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#)
            .create_async()
            .await;

        let err = client_for(&server).instant_query("sum(").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Query(_)), "got {:?}", err);
        assert!(err.to_string().contains("bad_data"));
    }

    #[tokio::test]
    async fn test_http_error_is_query_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = client_for(&server).instant_query("up").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Query(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_query_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = client_for(&server).instant_query("up").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Query(_)));
    }

    #[tokio::test]
    async fn test_non_numeric_value_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"result":[{"metric":{},"value":[1,"ten"]}]}}"#,
            )
            .create_async()
            .await;

        let err = client_for(&server).instant_query("up").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Parse(_)));
    }

    #[tokio::test]
    async fn test_range_query_decodes_matrix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query_range")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "cpu".into()),
                Matcher::UrlEncoded("start".into(), "1709251200".into()),
                Matcher::UrlEncoded("end".into(), "1709856000".into()),
                Matcher::UrlEncoded("step".into(), "3600".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"resultType":"matrix","result":[
                    {"metric":{"namespace":"prod","pod":"api-1","container":"app"},
                     "values":[[1709852400,"0.25"],[1709856000,"0.5"]]}
                ]}}"#,
            )
            .create_async()
            .await;

        let end = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let range = QueryRange::ending_at(end, chrono::Duration::days(7), chrono::Duration::hours(1));
        let series = client_for(&server).range_query("cpu", range).await.unwrap();

        mock.assert_async().await;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label("pod"), Some("api-1"));
        assert_eq!(series[0].points, vec![(1709852400, 0.25), (1709856000, 0.5)]);
    }

    #[tokio::test]
    async fn test_label_values() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/label/exported_service/values")
            .with_status(200)
            .with_body(r#"{"status":"success","data":["prod-api-80@kubernetescrd","dashboard@internal"]}"#)
            .create_async()
            .await;

        let values = client_for(&server)
            .label_values("exported_service")
            .await
            .unwrap();
        assert_eq!(values, vec!["prod-api-80@kubernetescrd", "dashboard@internal"]);
    }

    #[tokio::test]
    async fn test_endpoint_with_path_prefix() {
        let client =
            PrometheusClient::new(PrometheusConfig::new("http://monitoring:9090/prometheus")).unwrap();
        let url = client.endpoint("api/v1/query", &[("query", "up".to_string())]).unwrap();
        assert_eq!(url.as_str(), "http://monitoring:9090/prometheus/api/v1/query?query=up");
    }

    #[test]
    fn test_empty_endpoint_is_configuration_error() {
        let err = PrometheusClient::new(PrometheusConfig::new("  ")).err().unwrap();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }

    #[test]
    fn test_special_float_values() {
        assert!(parse_value(&serde_json::json!("NaN")).unwrap().is_nan());
        assert_eq!(parse_value(&serde_json::json!("+Inf")).unwrap(), f64::INFINITY);
    }
}
