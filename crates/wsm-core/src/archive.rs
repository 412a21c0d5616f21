//! Chart archive loading
//!
//! Charts are consumed as `.tgz` archives (or unpacked directories). Loading
//! only reads `Chart.yaml`; templates are left to the installer.

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use crate::error::{CoreError, Result};

const CHART_FILE: &str = "Chart.yaml";

/// The subset of `Chart.yaml` we care about
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A chart on the local filesystem whose metadata has been validated
#[derive(Debug, Clone)]
pub struct ChartArchive {
    pub path: PathBuf,
    pub metadata: ChartMetadata,
}

impl ChartArchive {
    /// Load a chart archive or chart directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.is_dir() {
            std::fs::read_to_string(path.join(CHART_FILE)).map_err(|e| invalid(path, e))?
        } else {
            read_chart_yaml(path)?
        };

        let metadata: ChartMetadata =
            serde_yaml::from_str(&content).map_err(|e| invalid(path, e))?;

        semver::Version::parse(&metadata.version).map_err(|e| {
            invalid(path, format!("version '{}' is not semver: {}", metadata.version, e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }
}

/// Find `<chart>/Chart.yaml` at the top level of a gzipped tarball
fn read_chart_yaml(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries().map_err(|e| invalid(path, e))? {
        let mut entry = entry.map_err(|e| invalid(path, e))?;
        let entry_path = entry.path().map_err(|e| invalid(path, e))?.into_owned();

        let components: Vec<_> = entry_path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if components.len() == 2 && components[1].as_os_str() == CHART_FILE {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| invalid(path, e))?;
            return Ok(content);
        }
    }

    Err(invalid(path, format!("no {CHART_FILE} found")))
}

fn invalid(path: &Path, message: impl ToString) -> CoreError {
    CoreError::InvalidChart {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tar::{Builder, Header};
    use tempfile::TempDir;

    fn write_chart(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_load_chart_archive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("operator-1.3.0.tgz");
        write_chart(
            &path,
            &[
                (
                    "operator/Chart.yaml",
                    "apiVersion: v2\nname: operator\nversion: 1.3.0\nappVersion: 1.10.1\n",
                ),
                ("operator/templates/deployment.yaml", "kind: Deployment\n"),
                ("operator/charts/sub/Chart.yaml", "name: sub\nversion: 0.1.0\n"),
            ],
        );

        let chart = ChartArchive::load(&path).unwrap();

        assert_eq!(chart.name(), "operator");
        assert_eq!(chart.version(), "1.3.0");
        assert_eq!(chart.metadata.app_version.as_deref(), Some("1.10.1"));
    }

    #[test]
    fn test_load_chart_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("Chart.yaml"),
            "name: operator-wandb\nversion: 0.18.0\n",
        )
        .unwrap();

        let chart = ChartArchive::load(temp.path()).unwrap();
        assert_eq!(chart.name(), "operator-wandb");
    }

    #[test]
    fn test_archive_without_chart_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken-1.0.0.tgz");
        write_chart(&path, &[("broken/values.yaml", "a: 1\n")]);

        let err = ChartArchive::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidChart { .. }));
    }

    #[test]
    fn test_not_a_gzip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("garbage.tgz");
        std::fs::write(&path, b"definitely not gzip").unwrap();

        assert!(matches!(
            ChartArchive::load(&path),
            Err(CoreError::InvalidChart { .. })
        ));
    }

    #[test]
    fn test_non_semver_version_rejected() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Chart.yaml"), "name: x\nversion: latest\n").unwrap();

        assert!(matches!(
            ChartArchive::load(temp.path()),
            Err(CoreError::InvalidChart { .. })
        ));
    }
}
