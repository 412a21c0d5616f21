//! Cluster-side operations
//!
//! [`Cluster`] is the seam between the orchestrator and the Kubernetes API;
//! [`KubeCluster`] implements it with kube-rs.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    Api, Client,
    api::{DynamicObject, ObjectMeta, Patch, PatchParams, PostParams},
    core::{GroupVersionKind, TypeMeta},
    discovery::{self, Scope},
};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;

use crate::crd::{FIELD_MANAGER, RESOURCE_NAME, RESOURCE_NAMESPACE, WeightsAndBiases};
use crate::error::{KubeError, Result};
use crate::manifest::parse_documents;

/// Operations wsm performs against a cluster
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Create the ConfigMap, or replace its `data` when it already exists
    async fn upsert_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<()>;

    /// Server-side apply the `WeightsAndBiases` resource with forced ownership
    async fn apply_custom_resource(&self, resource: &WeightsAndBiases) -> Result<()>;

    /// Server-side apply every document of a manifest; returns `Kind/name`
    /// for each applied object
    async fn apply_manifest(&self, namespace: &str, manifest: &str) -> Result<Vec<String>>;

    /// Raw bytes stored under `key` in a secret
    async fn read_secret(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>>;

    async fn scale_deployment(&self, namespace: &str, name: &str, replicas: i32) -> Result<()>;
}

/// kube-rs backed cluster
///
/// The client is created on first use from the ambient kubeconfig.
pub struct KubeCluster {
    client: OnceCell<Client>,
}

impl KubeCluster {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<Client> {
        let client = self
            .client
            .get_or_try_init(|| async { Client::try_default().await.map_err(KubeError::Api) })
            .await?;
        Ok(client.clone())
    }
}

impl Default for KubeCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn upsert_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client().await?, namespace);

        match api.get_opt(name).await? {
            Some(mut existing) => {
                existing.data = Some(data);
                api.replace(name, &PostParams::default(), &existing).await?;
                tracing::debug!(%namespace, %name, "configmap replaced");
            }
            None => {
                let config_map = ConfigMap {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(namespace.to_string()),
                        ..Default::default()
                    },
                    data: Some(data),
                    ..Default::default()
                };
                api.create(&PostParams::default(), &config_map).await?;
                tracing::debug!(%namespace, %name, "configmap created");
            }
        }
        Ok(())
    }

    async fn apply_custom_resource(&self, resource: &WeightsAndBiases) -> Result<()> {
        let namespace = resource
            .metadata
            .namespace
            .as_deref()
            .unwrap_or(RESOURCE_NAMESPACE);
        let name = resource.metadata.name.as_deref().unwrap_or(RESOURCE_NAME);

        let api: Api<WeightsAndBiases> = Api::namespaced(self.client().await?, namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(name, &params, &Patch::Apply(resource)).await?;
        Ok(())
    }

    async fn apply_manifest(&self, namespace: &str, manifest: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let mut applied = Vec::new();

        for document in parse_documents(manifest)? {
            let mut obj: DynamicObject = serde_json::from_value(document)?;
            let type_meta = obj.types.clone().ok_or_else(|| {
                KubeError::InvalidManifest("resource missing apiVersion or kind".to_string())
            })?;
            let name = obj.metadata.name.clone().ok_or_else(|| {
                KubeError::InvalidManifest(format!("{} missing metadata.name", type_meta.kind))
            })?;

            let gvk = gvk_from_type_meta(&type_meta);
            let (resource, capabilities) = discovery::pinned_kind(&client, &gvk).await?;

            let api: Api<DynamicObject> = if capabilities.scope == Scope::Namespaced {
                let ns = obj
                    .metadata
                    .namespace
                    .get_or_insert_with(|| namespace.to_string())
                    .clone();
                Api::namespaced_with(client.clone(), &ns, &resource)
            } else {
                Api::all_with(client.clone(), &resource)
            };

            api.patch(&name, &params, &Patch::Apply(&obj))
                .await
                .map_err(|e| KubeError::ResourceApply {
                    kind: type_meta.kind.clone(),
                    name: name.clone(),
                    source: Box::new(KubeError::Api(e)),
                })?;

            tracing::debug!(kind = %type_meta.kind, %name, "applied");
            applied.push(format!("{}/{}", type_meta.kind, name));
        }

        Ok(applied)
    }

    async fn read_secret(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>> {
        let api: Api<Secret> = Api::namespaced(self.client().await?, namespace);
        let secret = api
            .get_opt(name)
            .await?
            .ok_or_else(|| KubeError::SecretNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;

        secret
            .data
            .and_then(|mut data| data.remove(key))
            .map(|bytes| bytes.0)
            .ok_or_else(|| KubeError::SecretKeyMissing {
                name: name.to_string(),
                key: key.to_string(),
            })
    }

    async fn scale_deployment(&self, namespace: &str, name: &str, replicas: i32) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        api.patch_scale(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        tracing::debug!(%namespace, %name, replicas, "deployment scaled");
        Ok(())
    }
}

fn gvk_from_type_meta(type_meta: &TypeMeta) -> GroupVersionKind {
    let (group, version) = type_meta
        .api_version
        .split_once('/')
        .unwrap_or(("", type_meta.api_version.as_str()));
    GroupVersionKind::gvk(group, version, &type_meta.kind)
}
