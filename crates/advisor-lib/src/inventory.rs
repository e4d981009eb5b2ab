//! Cluster inventory seam
//!
//! The engine only needs the replica floor of a workload. Where that number
//! comes from (a static setting, the Kubernetes API) is up to the provider.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Source of per-workload replica floors
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Replica floor for a workload, `None` when the provider has no opinion
    async fn min_replicas(&self, namespace: &str, workload: &str) -> Result<Option<u32>>;
}

/// Provider answering from a fixed table with a shared default
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    default_floor: Option<u32>,
    overrides: HashMap<(String, String), u32>,
}

impl StaticInventory {
    /// Every workload gets `floor`
    pub fn new(floor: u32) -> Self {
        Self {
            default_floor: Some(floor),
            overrides: HashMap::new(),
        }
    }

    /// Provider that never answers, leaving the configured floor in place
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_override(
        mut self,
        namespace: impl Into<String>,
        workload: impl Into<String>,
        floor: u32,
    ) -> Self {
        self.overrides
            .insert((namespace.into(), workload.into()), floor);
        self
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn min_replicas(&self, namespace: &str, workload: &str) -> Result<Option<u32>> {
        let key = (namespace.to_string(), workload.to_string());
        Ok(self.overrides.get(&key).copied().or(self.default_floor))
    }
}
