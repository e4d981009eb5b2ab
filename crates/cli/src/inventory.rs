//! Kubernetes-backed replica floors
//!
//! The floor of a workload is the `minReplicas` of the HPA targeting its
//! Deployment, else the Deployment's `spec.replicas`.

use advisor_lib::{AdvisorError, InventoryProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

/// HPA default when `minReplicas` is unset
const HPA_DEFAULT_MIN_REPLICAS: i32 = 1;

pub struct KubeInventory {
    client: Client,
}

impl KubeInventory {
    /// Connect using an explicit kubeconfig, or in-cluster/default config
    pub async fn connect(kubeconfig: Option<&str>) -> Result<Self> {
        let config = match kubeconfig {
            Some(_) => {
                let path = crate::config::kubeconfig_path(kubeconfig)?;
                let kubeconfig = Kubeconfig::read_from(&path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Invalid kubeconfig")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration")?,
        };

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        Ok(Self { client })
    }
}

fn to_floor(replicas: i32) -> u32 {
    replicas.max(0) as u32
}

/// `minReplicas` of the HPA scaling `workload`, if any
pub fn hpa_floor(hpas: &[HorizontalPodAutoscaler], workload: &str) -> Option<u32> {
    hpas.iter()
        .filter_map(|hpa| hpa.spec.as_ref())
        .find(|spec| {
            spec.scale_target_ref.kind == "Deployment" && spec.scale_target_ref.name == workload
        })
        .map(|spec| to_floor(spec.min_replicas.unwrap_or(HPA_DEFAULT_MIN_REPLICAS)))
}

fn inventory_error(what: &str, namespace: &str, err: kube::Error) -> AdvisorError {
    AdvisorError::Inventory(format!("failed to {} in {}: {}", what, namespace, err))
}

#[async_trait]
impl InventoryProvider for KubeInventory {
    async fn min_replicas(
        &self,
        namespace: &str,
        workload: &str,
    ) -> advisor_lib::Result<Option<u32>> {
        let hpas: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), namespace);
        let list = hpas
            .list(&ListParams::default())
            .await
            .map_err(|e| inventory_error("list autoscalers", namespace, e))?;
        if let Some(floor) = hpa_floor(&list.items, workload) {
            debug!(namespace = %namespace, workload = %workload, floor, "Replica floor from HPA");
            return Ok(Some(floor));
        }

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployment = deployments
            .get_opt(workload)
            .await
            .map_err(|e| inventory_error("get deployment", namespace, e))?;

        Ok(deployment
            .and_then(|d| d.spec)
            .and_then(|spec| spec.replicas)
            .map(to_floor))
    }
}
