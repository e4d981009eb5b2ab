//! Report sinks
//!
//! A sink receives every finished record exactly once. In parallel mode it is
//! shared behind a [`tokio::sync::Mutex`] and locked per write.

use crate::error::{AdvisorError, Result};
use crate::models::{AdviceRecord, TrendRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Destination for finished records
#[async_trait]
pub trait ReportSink: Send {
    async fn write_advice(&mut self, record: AdviceRecord) -> Result<()>;

    async fn write_trend(&mut self, record: TrendRecord) -> Result<()>;

    /// Flush buffered output; called once after the last record
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink shared between concurrent writers
pub type SharedSink = Arc<Mutex<dyn ReportSink>>;

/// Keeps every record in memory, in arrival order
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub advice: Vec<AdviceRecord>,
    pub trends: Vec<TrendRecord>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advice records ordered by namespace, then service
    pub fn sorted_advice(&self) -> Vec<AdviceRecord> {
        let mut records = self.advice.clone();
        records.sort_by(|a, b| {
            (a.namespace.as_str(), a.service.as_str()).cmp(&(b.namespace.as_str(), b.service.as_str()))
        });
        records
    }
}

#[async_trait]
impl ReportSink for CollectingSink {
    async fn write_advice(&mut self, record: AdviceRecord) -> Result<()> {
        self.advice.push(record);
        Ok(())
    }

    async fn write_trend(&mut self, record: TrendRecord) -> Result<()> {
        self.trends.push(record);
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    generated_at: String,
    #[serde(skip_serializing_if = "<[AdviceRecord]>::is_empty")]
    advice: &'a [AdviceRecord],
    #[serde(skip_serializing_if = "<[TrendRecord]>::is_empty")]
    trends: &'a [TrendRecord],
}

/// Buffers records and writes one pretty-printed JSON document on finish
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    advice: Vec<AdviceRecord>,
    trends: Vec<TrendRecord>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            advice: Vec::new(),
            trends: Vec::new(),
        }
    }

    /// Sink writing to `<dir>/<prefix>-<timestamp>.json`
    pub fn timestamped(dir: &Path, prefix: &str, now: DateTime<Utc>) -> Self {
        Self::new(dir.join(timestamped_filename(prefix, now)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<prefix>-YYYYMMDD-HHMMSS.json`
pub fn timestamped_filename(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.json", prefix, now.format("%Y%m%d-%H%M%S"))
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn write_advice(&mut self, record: AdviceRecord) -> Result<()> {
        self.advice.push(record);
        Ok(())
    }

    async fn write_trend(&mut self, record: TrendRecord) -> Result<()> {
        self.trends.push(record);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let document = ReportDocument {
            generated_at: Utc::now().to_rfc3339(),
            advice: &self.advice,
            trends: &self.trends,
        };
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|e| AdvisorError::Sink(format!("failed to encode report: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AdvisorError::Sink(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(&self.path, body).await.map_err(|e| {
            AdvisorError::Sink(format!("failed to write {}: {}", self.path.display(), e))
        })?;

        info!(
            path = %self.path.display(),
            advice = self.advice.len(),
            trends = self.trends.len(),
            "Report written"
        );
        Ok(())
    }
}

/// Forwards every record to two sinks
pub struct TeeSink<A, B> {
    first: A,
    second: B,
}

impl<A, B> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

#[async_trait]
impl<A: ReportSink, B: ReportSink> ReportSink for TeeSink<A, B> {
    async fn write_advice(&mut self, record: AdviceRecord) -> Result<()> {
        self.first.write_advice(record.clone()).await?;
        self.second.write_advice(record).await
    }

    async fn write_trend(&mut self, record: TrendRecord) -> Result<()> {
        self.first.write_trend(record.clone()).await?;
        self.second.write_trend(record).await
    }

    async fn finish(&mut self) -> Result<()> {
        self.first.finish().await?;
        self.second.finish().await
    }
}
