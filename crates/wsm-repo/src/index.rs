//! Helm repository index (`index.yaml`)

use semver::Version;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{RepoError, Result};

/// Repository index
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default)]
    pub api_version: Option<String>,

    /// Chart versions indexed by chart name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

/// A single chart version in the index
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Absolute URLs or paths relative to the repository
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 of the archive
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartEntry {
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(self.version.trim_start_matches('v')).ok()
    }
}

impl RepositoryIndex {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    pub fn get(&self, name: &str) -> Option<&Vec<ChartEntry>> {
        self.entries.get(name)
    }

    /// Highest stable version, falling back to pre-releases when there is
    /// no stable one
    pub fn get_latest(&self, name: &str) -> Option<&ChartEntry> {
        let versions = self.entries.get(name)?;
        let is_stable = |e: &&ChartEntry| e.parsed_version().is_some_and(|v| v.pre.is_empty());

        versions
            .iter()
            .filter(is_stable)
            .max_by(compare_versions)
            .or_else(|| versions.iter().max_by(compare_versions))
    }

    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version == version)
    }
}

fn compare_versions(a: &&ChartEntry, b: &&ChartEntry) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> RepositoryIndex {
        RepositoryIndex::from_yaml(
            r#"
apiVersion: v1
generated: "2024-05-01T10:00:00Z"
entries:
  operator:
    - name: operator
      version: 1.2.0
      urls: [operator-1.2.0.tgz]
    - name: operator
      version: 1.10.0
      digest: 0f2a
      urls: [https://github.com/wandb/helm-charts/releases/download/operator-1.10.0/operator-1.10.0.tgz]
    - name: operator
      version: 2.0.0-rc.1
      urls: [operator-2.0.0-rc.1.tgz]
  operator-wandb:
    - name: operator-wandb
      version: 0.18.0
      appVersion: 0.59.2
      created: "2024-05-01T10:00:00Z"
      urls: [operator-wandb-0.18.0.tgz]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_index() {
        let index = sample_index();
        assert_eq!(index.api_version.as_deref(), Some("v1"));
        assert_eq!(index.get("operator").unwrap().len(), 3);
        assert_eq!(
            index.get_version("operator-wandb", "0.18.0").unwrap().app_version.as_deref(),
            Some("0.59.2")
        );
    }

    #[test]
    fn test_get_latest_uses_semver_and_skips_prereleases() {
        let index = sample_index();
        let latest = index.get_latest("operator").unwrap();
        assert_eq!(latest.version, "1.10.0");
        assert_eq!(latest.digest.as_deref(), Some("0f2a"));
    }

    #[test]
    fn test_get_latest_prerelease_only() {
        let index = RepositoryIndex::from_yaml(
            "entries:\n  x:\n    - {name: x, version: 1.0.0-rc.1}\n    - {name: x, version: 1.0.0-rc.2}\n",
        )
        .unwrap();
        assert_eq!(index.get_latest("x").unwrap().version, "1.0.0-rc.2");
    }

    #[test]
    fn test_missing_chart() {
        let index = sample_index();
        assert!(index.get_latest("nope").is_none());
        assert!(index.get_version("operator", "9.9.9").is_none());
    }

    #[test]
    fn test_invalid_index() {
        assert!(matches!(
            RepositoryIndex::from_yaml("entries: [1, 2"),
            Err(RepoError::IndexParseError { .. })
        ));
    }
}
