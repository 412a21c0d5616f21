//! Well-known endpoints and the host-side chart cache

use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Release channel serving the current deployment spec
pub const DEFAULT_CHANNEL_URL: &str = "https://deploy.wandb.ai/api/v1/operator/channel";

/// Environment variable overriding [`DEFAULT_CHANNEL_URL`]
pub const CHANNEL_URL_ENV: &str = "DEPLOYER_CHANNEL_URL";

/// Helm repository hosting the operator and application charts
pub const WANDB_HELM_REPO_URL: &str = "https://charts.wandb.ai";

/// Application chart
pub const WANDB_CHART: &str = "operator-wandb";

/// Operator chart
pub const OPERATOR_CHART: &str = "operator";

pub const DOCKER_HUB_API: &str = "https://registry.hub.docker.com";

/// Image run by the operator chart
pub const CONTROLLER_IMAGE: &str = "wandb/controller";

/// Remote endpoints used by a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub channel_url: String,
    pub helm_repo_url: String,
    pub docker_hub_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            channel_url: DEFAULT_CHANNEL_URL.to_string(),
            helm_repo_url: WANDB_HELM_REPO_URL.to_string(),
            docker_hub_api: DOCKER_HUB_API.to_string(),
        }
    }
}

impl Endpoints {
    pub fn with_channel_url(mut self, url: impl Into<String>) -> Self {
        self.channel_url = url.into();
        self
    }
}

/// Directory where downloaded charts are kept across invocations
#[derive(Debug, Clone)]
pub struct ChartCache {
    dir: PathBuf,
}

impl ChartCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.wandb/charts`
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".wandb").join("charts"))
            .ok_or_else(|| RepoError::CacheError {
                message: "could not determine home directory".to_string(),
            })
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for a chart version
    pub fn chart_path(&self, name: &str, version: &str) -> PathBuf {
        self.dir.join(format!("{}-{}.tgz", name, version))
    }

    /// Create the cache directory if needed
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.channel_url, DEFAULT_CHANNEL_URL);
        assert_eq!(endpoints.helm_repo_url, "https://charts.wandb.ai");
    }

    #[test]
    fn test_channel_url_override() {
        let endpoints = Endpoints::default().with_channel_url("http://localhost:9000/channel");
        assert_eq!(endpoints.channel_url, "http://localhost:9000/channel");
        assert_eq!(endpoints.helm_repo_url, WANDB_HELM_REPO_URL);
    }

    #[test]
    fn test_chart_cache_paths() {
        let temp = tempfile::TempDir::new().unwrap();
        let cache = ChartCache::new(temp.path().join("charts"));

        assert_eq!(
            cache.chart_path("operator", "1.3.0"),
            temp.path().join("charts").join("operator-1.3.0.tgz")
        );

        cache.ensure().unwrap();
        assert!(cache.dir().is_dir());
    }

    #[test]
    fn test_default_cache_dir() {
        if let Ok(dir) = ChartCache::default_dir() {
            assert!(dir.ends_with(".wandb/charts"));
        }
    }
}
