//! Helm HTTP repository client
//!
//! Charts are downloaded into the [`ChartCache`] as `<name>-<version>.tgz`
//! and reused on later invocations.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::ChartCache;
use crate::error::{RepoError, Result};
use crate::index::{ChartEntry, RepositoryIndex};

/// Makes a chart available on the local filesystem
#[async_trait]
pub trait ChartFetcher: Send + Sync {
    /// Fetch `name` from the repository at `repo_url`
    ///
    /// `None` selects the latest version. Returns the path of the archive.
    async fn fetch(&self, repo_url: &str, name: &str, version: Option<&str>) -> Result<PathBuf>;
}

/// Helm repository client backed by the host chart cache
pub struct ChartRepository {
    client: reqwest::Client,
    cache: ChartCache,
}

impl ChartRepository {
    pub fn new(cache: ChartCache) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wsm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, cache })
    }

    pub fn cache(&self) -> &ChartCache {
        &self.cache
    }

    /// Fetch and parse `index.yaml`
    pub async fn fetch_index(&self, repo_url: &str) -> Result<RepositoryIndex> {
        let index_url = format!("{}/index.yaml", repo_url.trim_end_matches('/'));
        tracing::debug!(url = %index_url, "fetching repository index");

        let data = self.get_bytes(&index_url).await?;
        RepositoryIndex::from_bytes(&data)
    }

    /// Download a chart archive and verify its digest
    pub async fn download(&self, repo_url: &str, entry: &ChartEntry) -> Result<Vec<u8>> {
        let url = entry
            .download_url()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: entry.name.clone(),
                repo: repo_url.to_string(),
            })?;

        // Resolve relative URLs
        let full_url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", repo_url.trim_end_matches('/'), url)
        };

        tracing::debug!(url = %full_url, "downloading chart");
        let data = self.get_bytes(&full_url).await?;

        if let Some(expected_digest) = &entry.digest {
            let actual_digest = compute_digest(&data);
            if !digest_matches(expected_digest, &actual_digest) {
                return Err(RepoError::IntegrityCheckFailed {
                    name: entry.name.clone(),
                    expected: expected_digest.clone(),
                    actual: actual_digest,
                });
            }
        }

        Ok(data)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ChartFetcher for ChartRepository {
    async fn fetch(&self, repo_url: &str, name: &str, version: Option<&str>) -> Result<PathBuf> {
        if let Some(version) = version {
            let cached = self.cache.chart_path(name, version);
            if cached.is_file() {
                tracing::debug!(path = %cached.display(), "using cached chart");
                return Ok(cached);
            }
        }

        let index = self.fetch_index(repo_url).await?;
        if index.get(name).is_none() {
            return Err(RepoError::ChartNotFound {
                name: name.to_string(),
                repo: repo_url.to_string(),
            });
        }

        let entry = match version {
            Some(version) => {
                index
                    .get_version(name, version)
                    .ok_or_else(|| RepoError::VersionNotFound {
                        name: name.to_string(),
                        version: version.to_string(),
                        repo: repo_url.to_string(),
                    })?
            }
            None => index
                .get_latest(name)
                .ok_or_else(|| RepoError::ChartNotFound {
                    name: name.to_string(),
                    repo: repo_url.to_string(),
                })?,
        };

        let path = self.cache.chart_path(&entry.name, &entry.version);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "using cached chart");
            return Ok(path);
        }

        let data = self.download(repo_url, entry).await?;

        // Only complete downloads land at the cache path
        self.cache.ensure()?;
        let partial = path.with_extension("tgz.partial");
        tokio::fs::write(&partial, &data).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::info!(chart = %entry.name, version = %entry.version, "chart downloaded");
        Ok(path)
    }
}

/// Compute SHA256 digest of data
pub(crate) fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Compare digests with or without an algorithm prefix
fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |d: &str| {
        d.trim()
            .to_lowercase()
            .replace("sha256:", "")
            .replace("sha256-", "")
    };
    normalize(expected) == normalize(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHART_BYTES: &[u8] = b"not really a chart, but bytes are bytes";

    fn index_yaml(digest: &str) -> String {
        format!(
            r#"apiVersion: v1
entries:
  operator:
    - name: operator
      version: 1.1.0
      urls: [operator-1.1.0.tgz]
    - name: operator
      version: 1.3.0
      digest: "{digest}"
      urls: [charts/operator-1.3.0.tgz]
"#
        )
    }

    async fn repo_server(digest: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml(digest)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/operator-1.3.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(CHART_BYTES))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_compute_digest() {
        let digest = compute_digest(b"hello world");
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), 7 + 64);
    }

    #[test]
    fn test_digest_matches() {
        assert!(digest_matches("sha256:abc123", "sha256:ABC123"));
        assert!(digest_matches("sha256:abc123", "abc123"));
        assert!(digest_matches("sha256:abc123", "sha256-abc123"));
        assert!(!digest_matches("sha256:abc123", "sha256:xyz789"));
    }

    #[tokio::test]
    async fn test_fetch_latest_into_cache() {
        let digest = compute_digest(CHART_BYTES);
        let server = repo_server(digest.trim_start_matches("sha256:")).await;
        let temp = TempDir::new().unwrap();
        let repo = ChartRepository::new(ChartCache::new(temp.path().join("charts"))).unwrap();

        let path = repo.fetch(&server.uri(), "operator", None).await.unwrap();

        assert_eq!(path, temp.path().join("charts").join("operator-1.3.0.tgz"));
        assert_eq!(std::fs::read(&path).unwrap(), CHART_BYTES);
    }

    #[tokio::test]
    async fn test_cached_version_skips_network() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let cache = ChartCache::new(temp.path());
        std::fs::write(cache.chart_path("operator", "1.3.0"), b"cached").unwrap();
        let repo = ChartRepository::new(cache).unwrap();

        let path = repo
            .fetch(&server.uri(), "operator", Some("1.3.0"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"cached");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_digest_mismatch() {
        let server = repo_server("deadbeef").await;
        let temp = TempDir::new().unwrap();
        let repo = ChartRepository::new(ChartCache::new(temp.path())).unwrap();

        let err = repo.fetch(&server.uri(), "operator", None).await.unwrap_err();

        assert!(matches!(err, RepoError::IntegrityCheckFailed { .. }));
        assert!(!temp.path().join("operator-1.3.0.tgz").exists());
    }

    #[tokio::test]
    async fn test_missing_chart_and_version() {
        let server = repo_server("deadbeef").await;
        let temp = TempDir::new().unwrap();
        let repo = ChartRepository::new(ChartCache::new(temp.path())).unwrap();

        assert!(matches!(
            repo.fetch(&server.uri(), "operator-wandb", None).await,
            Err(RepoError::ChartNotFound { .. })
        ));
        assert!(matches!(
            repo.fetch(&server.uri(), "operator", Some("9.9.9")).await,
            Err(RepoError::VersionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_index_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let repo = ChartRepository::new(ChartCache::new(temp.path())).unwrap();

        assert!(matches!(
            repo.fetch_index(&server.uri()).await,
            Err(RepoError::HttpError { status: 404, .. })
        ));
    }
}
