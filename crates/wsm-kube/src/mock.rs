//! In-memory collaborators for testing
//!
//! These stand in for the cluster, helm, the chart repository and the
//! release channel so deploys can be exercised without network access or a
//! Kubernetes cluster.

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tar::{Builder, Header};
use wsm_core::{Spec, Values};
use wsm_repo::{ChannelSource, ChartFetcher, RepoError};

use crate::cluster::Cluster;
use crate::crd::WeightsAndBiases;
use crate::error::{KubeError, Result};
use crate::helm::{ChartInstaller, ChartRenderer};
use crate::manifest::parse_documents;

/// Counts of cluster operations for assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub config_map_upserts: usize,
    pub resource_applies: usize,
    pub manifest_applies: usize,
    pub secret_reads: usize,
    pub scales: usize,
}

/// In-memory cluster
#[derive(Clone, Default)]
pub struct MockCluster {
    /// (namespace, name) -> data
    config_maps: Arc<RwLock<BTreeMap<(String, String), BTreeMap<String, String>>>>,
    resources: Arc<RwLock<Vec<WeightsAndBiases>>>,
    manifests: Arc<RwLock<Vec<(String, String)>>>,
    /// (namespace, name) -> key -> bytes
    secrets: Arc<RwLock<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>>,
    scaled: Arc<RwLock<Vec<(String, String, i32)>>>,
    operations: Arc<RwLock<OperationCounts>>,
    fail_config_maps: bool,
    fail_applies: bool,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every ConfigMap upsert fails
    pub fn failing_config_maps(mut self) -> Self {
        self.fail_config_maps = true;
        self
    }

    /// Every custom resource apply fails
    pub fn failing_applies(mut self) -> Self {
        self.fail_applies = true;
        self
    }

    pub fn with_secret(self, namespace: &str, name: &str, key: &str, value: &[u8]) -> Self {
        self.secrets
            .write()
            .unwrap()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.to_vec());
        self
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.config_maps
            .read()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn config_map_count(&self) -> usize {
        self.config_maps.read().unwrap().len()
    }

    /// Custom resources in apply order
    pub fn applied_resources(&self) -> Vec<WeightsAndBiases> {
        self.resources.read().unwrap().clone()
    }

    /// (namespace, manifest) pairs in apply order
    pub fn applied_manifests(&self) -> Vec<(String, String)> {
        self.manifests.read().unwrap().clone()
    }

    /// (namespace, deployment, replicas) in call order
    pub fn scaled(&self) -> Vec<(String, String, i32)> {
        self.scaled.read().unwrap().clone()
    }
}

fn mock_failure(what: &str) -> KubeError {
    KubeError::Io(std::io::Error::other(format!("mock {what} failure")))
}

#[async_trait]
impl Cluster for MockCluster {
    async fn upsert_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<()> {
        self.operations.write().unwrap().config_map_upserts += 1;
        if self.fail_config_maps {
            return Err(mock_failure("configmap"));
        }
        self.config_maps
            .write()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
        Ok(())
    }

    async fn apply_custom_resource(&self, resource: &WeightsAndBiases) -> Result<()> {
        self.operations.write().unwrap().resource_applies += 1;
        if self.fail_applies {
            return Err(mock_failure("apply"));
        }
        self.resources.write().unwrap().push(resource.clone());
        Ok(())
    }

    async fn apply_manifest(&self, namespace: &str, manifest: &str) -> Result<Vec<String>> {
        self.operations.write().unwrap().manifest_applies += 1;
        let applied = parse_documents(manifest)?
            .iter()
            .map(|doc| {
                format!(
                    "{}/{}",
                    doc["kind"].as_str().unwrap_or_default(),
                    doc["metadata"]["name"].as_str().unwrap_or_default()
                )
            })
            .collect();
        self.manifests
            .write()
            .unwrap()
            .push((namespace.to_string(), manifest.to_string()));
        Ok(applied)
    }

    async fn read_secret(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>> {
        self.operations.write().unwrap().secret_reads += 1;
        let secrets = self.secrets.read().unwrap();
        let data = secrets
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| KubeError::SecretNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;
        data.get(key).cloned().ok_or_else(|| KubeError::SecretKeyMissing {
            name: name.to_string(),
            key: key.to_string(),
        })
    }

    async fn scale_deployment(&self, namespace: &str, name: &str, replicas: i32) -> Result<()> {
        self.operations.write().unwrap().scales += 1;
        self.scaled
            .write()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), replicas));
        Ok(())
    }
}

/// One recorded chart install
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRecord {
    pub release: String,
    pub chart: PathBuf,
    pub namespace: String,
    pub values: Values,
}

/// Records installs and serves a canned manifest for renders
#[derive(Clone, Default)]
pub struct MockInstaller {
    installs: Arc<RwLock<Vec<InstallRecord>>>,
    renders: Arc<RwLock<Vec<InstallRecord>>>,
    manifest: String,
    fail: bool,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn installs(&self) -> Vec<InstallRecord> {
        self.installs.read().unwrap().clone()
    }

    pub fn renders(&self) -> Vec<InstallRecord> {
        self.renders.read().unwrap().clone()
    }

    fn record(release: &str, chart: &Path, namespace: &str, values: &Values) -> InstallRecord {
        InstallRecord {
            release: release.to_string(),
            chart: chart.to_path_buf(),
            namespace: namespace.to_string(),
            values: values.clone(),
        }
    }
}

#[async_trait]
impl ChartInstaller for MockInstaller {
    async fn install(
        &self,
        release: &str,
        chart: &Path,
        namespace: &str,
        values: &Values,
    ) -> Result<()> {
        if self.fail {
            return Err(KubeError::ChartInstall {
                release: release.to_string(),
                namespace: namespace.to_string(),
                message: "mock install failure".to_string(),
            });
        }
        self.installs
            .write()
            .unwrap()
            .push(Self::record(release, chart, namespace, values));
        Ok(())
    }
}

#[async_trait]
impl ChartRenderer for MockInstaller {
    async fn render(
        &self,
        release: &str,
        chart: &Path,
        namespace: &str,
        values: &Values,
    ) -> Result<String> {
        if self.fail {
            return Err(KubeError::ChartRender {
                chart: chart.display().to_string(),
                message: "mock render failure".to_string(),
            });
        }
        self.renders
            .write()
            .unwrap()
            .push(Self::record(release, chart, namespace, values));
        Ok(self.manifest.clone())
    }
}

/// Serves charts from local paths by name
#[derive(Clone, Default)]
pub struct MockFetcher {
    charts: HashMap<String, PathBuf>,
    /// (repo_url, name, version) in call order
    fetches: Arc<RwLock<Vec<(String, String, Option<String>)>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chart(mut self, name: &str, path: PathBuf) -> Self {
        self.charts.insert(name.to_string(), path);
        self
    }

    pub fn fetches(&self) -> Vec<(String, String, Option<String>)> {
        self.fetches.read().unwrap().clone()
    }
}

#[async_trait]
impl ChartFetcher for MockFetcher {
    async fn fetch(
        &self,
        repo_url: &str,
        name: &str,
        version: Option<&str>,
    ) -> wsm_repo::Result<PathBuf> {
        self.fetches.write().unwrap().push((
            repo_url.to_string(),
            name.to_string(),
            version.map(str::to_string),
        ));
        self.charts
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: name.to_string(),
                repo: repo_url.to_string(),
            })
    }
}

/// Release channel returning a fixed spec
#[derive(Clone, Default)]
pub struct MockChannel {
    spec: Spec,
    calls: Arc<RwLock<usize>>,
}

impl MockChannel {
    pub fn new(spec: Spec) -> Self {
        Self {
            spec,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.read().unwrap()
    }
}

#[async_trait]
impl ChannelSource for MockChannel {
    async fn fetch_spec(&self, _license: Option<&str>) -> wsm_repo::Result<Spec> {
        *self.calls.write().unwrap() += 1;
        Ok(self.spec.clone())
    }
}

/// Write a minimal `<name>-<version>.tgz` chart into `dir`
pub fn write_test_chart(dir: &Path, name: &str, version: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{name}-{version}.tgz"));
    let chart_yaml = format!("apiVersion: v2\nname: {name}\nversion: {version}\n");

    let file = File::create(&path)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    let mut header = Header::new_gnu();
    header.set_size(chart_yaml.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder.append_data(&mut header, format!("{name}/Chart.yaml"), chart_yaml.as_bytes())?;
    builder.into_inner()?.finish()?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wsm_core::ChartArchive;

    #[test]
    fn test_written_chart_loads() {
        let temp = TempDir::new().unwrap();
        let path = write_test_chart(temp.path(), "operator", "1.3.0").unwrap();

        assert!(path.ends_with("operator-1.3.0.tgz"));
        let chart = ChartArchive::load(&path).unwrap();
        assert_eq!(chart.name(), "operator");
        assert_eq!(chart.version(), "1.3.0");
    }

    #[tokio::test]
    async fn test_mock_cluster_secrets() {
        let cluster = MockCluster::new().with_secret("default", "wandb-password", "password", b"s3cret");

        let bytes = cluster
            .read_secret("default", "wandb-password", "password")
            .await
            .unwrap();
        assert_eq!(bytes, b"s3cret");

        assert!(matches!(
            cluster.read_secret("default", "wandb-password", "other").await,
            Err(KubeError::SecretKeyMissing { .. })
        ));
        assert!(matches!(
            cluster.read_secret("wandb", "wandb-password", "password").await,
            Err(KubeError::SecretNotFound { .. })
        ));
        assert_eq!(cluster.operation_counts().secret_reads, 3);
    }
}
