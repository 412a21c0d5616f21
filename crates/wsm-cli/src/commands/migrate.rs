//! Migrate command: hand an existing helm install over to the operator
//!
//! The legacy `wandb` deployment is scaled to zero, the operator is
//! installed, and the prepared `WeightsAndBiases` manifest is server-side
//! applied so the operator recreates the workload.

use std::path::Path;
use wsm_core::{ChartArchive, Values};
use wsm_kube::manifest::parse_documents;
use wsm_kube::{ChartInstaller, Cluster, HelmCli, KubeCluster, OPERATOR_RELEASE};
use wsm_repo::{ChartFetcher, OPERATOR_CHART};

use super::Context;
use crate::display;
use crate::error::{CliError, Result};

pub const DEFAULT_RESOURCE_FILE: &str = "wandb-cr.yaml";

/// Deployment created by the legacy helm install
const LEGACY_DEPLOYMENT: &str = "wandb";

pub async fn run(ctx: &Context, namespace: &str, file: &Path) -> Result<()> {
    let manifest = read_manifest(file)?;
    let charts = ctx.chart_repository()?;
    let helm = HelmCli::from_env();
    let cluster = KubeCluster::new();

    migrate(
        &cluster,
        &charts,
        &helm,
        &ctx.endpoints.helm_repo_url,
        namespace,
        &manifest,
    )
    .await?;

    display::success("Migration complete; the operator now manages W&B");
    Ok(())
}

/// Read the resource file, rejecting files without any document
fn read_manifest(file: &Path) -> Result<String> {
    let content = std::fs::read_to_string(file).map_err(|e| CliError::Io {
        message: format!("failed to read {}: {}", file.display(), e),
    })?;
    if parse_documents(&content)?.is_empty() {
        return Err(CliError::other(format!(
            "{} contains no resources",
            file.display()
        )));
    }
    Ok(content)
}

async fn migrate(
    cluster: &dyn Cluster,
    fetcher: &dyn ChartFetcher,
    installer: &dyn ChartInstaller,
    helm_repo_url: &str,
    namespace: &str,
    manifest: &str,
) -> Result<()> {
    display::step(format!("Scaling deployment {LEGACY_DEPLOYMENT} to 0"));
    cluster
        .scale_deployment(namespace, LEGACY_DEPLOYMENT, 0)
        .await?;

    display::step("Installing operator");
    let chart = fetcher.fetch(helm_repo_url, OPERATOR_CHART, None).await?;
    let chart = ChartArchive::load(&chart)?;
    installer
        .install(OPERATOR_RELEASE, &chart.path, namespace, &Values::new())
        .await?;

    display::step("Applying WeightsAndBiases resource");
    for applied in cluster.apply_manifest(namespace, manifest).await? {
        display::step(format!("Applied {}", applied));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wsm_kube::mock::{MockCluster, MockFetcher, MockInstaller, write_test_chart};

    const RESOURCE: &str = r#"apiVersion: apps.wandb.com/v1
kind: WeightsAndBiases
metadata:
  name: wandb
  namespace: default
spec:
  chart:
    url: https://charts.wandb.ai
    name: operator-wandb
    version: 0.18.0
  values:
    global:
      host: https://wandb.example.com
"#;

    #[test]
    fn test_read_manifest() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("wandb-cr.yaml");
        std::fs::write(&file, RESOURCE).unwrap();

        assert_eq!(read_manifest(&file).unwrap(), RESOURCE);
    }

    #[test]
    fn test_read_empty_manifest() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("wandb-cr.yaml");
        std::fs::write(&file, "# nothing here\n").unwrap();

        assert!(matches!(read_manifest(&file), Err(CliError::Other { .. })));
    }

    #[test]
    fn test_read_missing_manifest() {
        let err = read_manifest(Path::new("/nonexistent/wandb-cr.yaml")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[tokio::test]
    async fn test_migrate_order() {
        let temp = TempDir::new().unwrap();
        let chart = write_test_chart(temp.path(), "operator", "1.3.0").unwrap();
        let cluster = MockCluster::new();
        let fetcher = MockFetcher::new().with_chart("operator", chart.clone());
        let installer = MockInstaller::new();
        migrate(
            &cluster,
            &fetcher,
            &installer,
            "https://charts.wandb.ai",
            "wandb",
            RESOURCE,
        )
        .await
        .unwrap();

        assert_eq!(
            cluster.scaled(),
            vec![("wandb".to_string(), "wandb".to_string(), 0)]
        );
        let installs = installer.installs();
        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].release, "operator");
        assert_eq!(installs[0].chart, chart);
        assert_eq!(
            cluster.applied_manifests(),
            vec![("wandb".to_string(), RESOURCE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_install_failure_skips_apply() {
        let temp = TempDir::new().unwrap();
        let chart = write_test_chart(temp.path(), "operator", "1.3.0").unwrap();
        let cluster = MockCluster::new();
        let fetcher = MockFetcher::new().with_chart("operator", chart);
        let installer = MockInstaller::new().failing();
        let result = migrate(
            &cluster,
            &fetcher,
            &installer,
            "https://charts.wandb.ai",
            "wandb",
            RESOURCE,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(cluster.operation_counts().scales, 1);
        assert!(cluster.applied_manifests().is_empty());
    }
}
