//! Error types for wsm-kube

use std::path::PathBuf;

use thiserror::Error;
use wsm_core::CoreError;
use wsm_repo::RepoError;

use crate::orchestrator::DeployStage;

/// Result type for wsm-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while staging, installing or applying
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Chart archive could not be read from disk
    #[error("failed to read chart archive {path}: {source}")]
    ChartRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Chart could not be staged in the cluster
    #[error("failed to stage chart in ConfigMap '{name}' (namespace '{namespace}'): {source}")]
    ConfigStage {
        name: String,
        namespace: String,
        #[source]
        source: Box<KubeError>,
    },

    /// Chart installer reported a failure
    #[error("failed to install release '{release}' in namespace '{namespace}': {message}")]
    ChartInstall {
        release: String,
        namespace: String,
        message: String,
    },

    /// Chart could not be rendered with the given values
    #[error("failed to render chart '{chart}': {message}")]
    ChartRender { chart: String, message: String },

    /// Server-side apply of a resource failed
    #[error("failed to apply {kind} '{name}': {source}")]
    ResourceApply {
        kind: String,
        name: String,
        #[source]
        source: Box<KubeError>,
    },

    /// No chart source is known
    #[error("cannot locate chart: {message}")]
    ChartUnresolved { message: String },

    #[error("secret '{name}' not found in namespace '{namespace}'")]
    SecretNotFound { name: String, namespace: String },

    #[error("secret '{name}' has no key '{key}'")]
    SecretKeyMissing { name: String, key: String },

    /// Invalid manifest
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// A deploy step failed; no rollback is attempted
    #[error("deploy failed while {stage}: {source}")]
    Deploy {
        stage: DeployStage,
        #[source]
        source: Box<KubeError>,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Stage a deploy failed in, if this came out of the orchestrator
    pub fn stage(&self) -> Option<DeployStage> {
        match self {
            KubeError::Deploy { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
