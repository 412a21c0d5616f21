//! Airgapped chart staging
//!
//! The operator cannot reach a chart repository in an airgapped cluster, so
//! the application chart is shipped inside a ConfigMap that the operator
//! mounts at [`CHARTS_MOUNT_PATH`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cluster::Cluster;
use crate::error::{KubeError, Result};

/// ConfigMap holding base64-encoded chart archives, keyed by chart name
pub const CHARTS_CONFIG_MAP: &str = "wandb-charts";

/// Where the operator mounts [`CHARTS_CONFIG_MAP`]
pub const CHARTS_MOUNT_PATH: &str = "/charts";

/// A chart that has been placed in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChart {
    pub config_map: String,
    pub namespace: String,
    pub key: String,
    /// Path of the archive as seen by the operator
    pub in_cluster_path: String,
}

pub struct ChartPackager<'a> {
    cluster: &'a dyn Cluster,
}

impl<'a> ChartPackager<'a> {
    pub fn new(cluster: &'a dyn Cluster) -> Self {
        Self { cluster }
    }

    /// Copy a chart archive into the charts ConfigMap
    ///
    /// Re-staging the same chart replaces the ConfigMap contents.
    pub async fn stage_for_airgap(
        &self,
        chart_path: &Path,
        chart_name: &str,
        namespace: &str,
    ) -> Result<StagedChart> {
        let bytes = tokio::fs::read(chart_path)
            .await
            .map_err(|source| KubeError::ChartRead {
                path: chart_path.to_path_buf(),
                source,
            })?;

        let data = BTreeMap::from([(chart_name.to_string(), STANDARD.encode(&bytes))]);

        self.cluster
            .upsert_config_map(namespace, CHARTS_CONFIG_MAP, data)
            .await
            .map_err(|e| KubeError::ConfigStage {
                name: CHARTS_CONFIG_MAP.to_string(),
                namespace: namespace.to_string(),
                source: Box::new(e),
            })?;

        tracing::info!(
            chart = %chart_name,
            %namespace,
            size = bytes.len(),
            "chart staged for airgapped install"
        );

        Ok(StagedChart {
            config_map: CHARTS_CONFIG_MAP.to_string(),
            namespace: namespace.to_string(),
            key: chart_name.to_string(),
            in_cluster_path: format!("{CHARTS_MOUNT_PATH}/{chart_name}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCluster, write_test_chart};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stage_chart() {
        let temp = TempDir::new().unwrap();
        let chart = write_test_chart(temp.path(), "operator-wandb", "0.18.0").unwrap();
        let cluster = MockCluster::new();

        let staged = ChartPackager::new(&cluster)
            .stage_for_airgap(&chart, "operator-wandb", "wandb")
            .await
            .unwrap();

        assert_eq!(staged.config_map, "wandb-charts");
        assert_eq!(staged.key, "operator-wandb");
        assert_eq!(staged.in_cluster_path, "/charts/operator-wandb");

        let data = cluster.config_map("wandb", "wandb-charts").unwrap();
        let decoded = STANDARD.decode(&data["operator-wandb"]).unwrap();
        assert_eq!(decoded, std::fs::read(&chart).unwrap());
    }

    #[tokio::test]
    async fn test_restaging_keeps_one_config_map() {
        let temp = TempDir::new().unwrap();
        let chart = write_test_chart(temp.path(), "operator-wandb", "0.18.0").unwrap();
        let cluster = MockCluster::new();
        let packager = ChartPackager::new(&cluster);

        let first = packager
            .stage_for_airgap(&chart, "operator-wandb", "wandb")
            .await
            .unwrap();
        let stored_once = cluster.config_map("wandb", "wandb-charts").unwrap();

        let second = packager
            .stage_for_airgap(&chart, "operator-wandb", "wandb")
            .await
            .unwrap();
        let stored_twice = cluster.config_map("wandb", "wandb-charts").unwrap();

        assert_eq!(first, second);
        assert_eq!(stored_once, stored_twice);
        assert_eq!(stored_twice.len(), 1);
        assert_eq!(cluster.config_map_count(), 1);
        assert_eq!(cluster.operation_counts().config_map_upserts, 2);
    }

    #[tokio::test]
    async fn test_missing_archive() {
        let cluster = MockCluster::new();
        let err = ChartPackager::new(&cluster)
            .stage_for_airgap(Path::new("/nonexistent/chart.tgz"), "operator-wandb", "wandb")
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::ChartRead { .. }));
        assert_eq!(cluster.operation_counts().config_map_upserts, 0);
    }

    #[tokio::test]
    async fn test_cluster_failure_names_config_map() {
        let temp = TempDir::new().unwrap();
        let chart = write_test_chart(temp.path(), "operator-wandb", "0.18.0").unwrap();
        let cluster = MockCluster::new().failing_config_maps();

        let err = ChartPackager::new(&cluster)
            .stage_for_airgap(&chart, "operator-wandb", "wandb")
            .await
            .unwrap_err();

        match err {
            KubeError::ConfigStage { name, namespace, .. } => {
                assert_eq!(name, "wandb-charts");
                assert_eq!(namespace, "wandb");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
