//! Offline bundle layout
//!
//! ```text
//! bundle/
//! ├── spec.yaml
//! ├── charts/
//! │   ├── operator-1.3.0.tgz
//! │   └── operator-wandb-0.18.0.tgz
//! └── images/
//!     └── wandb/local:0.59.2/image.tgz
//! ```

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::spec::Spec;

pub const SPEC_FILE: &str = "spec.yaml";
pub const CHARTS_DIR: &str = "charts";
pub const IMAGES_DIR: &str = "images";
pub const IMAGE_ARCHIVE: &str = "image.tgz";

/// A bundle directory on disk
#[derive(Debug, Clone)]
pub struct Bundle {
    root: PathBuf,
}

impl Bundle {
    /// Open an existing bundle
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoreError::BundleNotFound { path: root });
        }
        Ok(Self { root })
    }

    /// Create the bundle skeleton, keeping anything already there
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(CHARTS_DIR))?;
        std::fs::create_dir_all(root.join(IMAGES_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spec_path(&self) -> PathBuf {
        self.root.join(SPEC_FILE)
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.root.join(CHARTS_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// Where the archive for an image reference lives
    pub fn image_archive_path(&self, reference: &str) -> PathBuf {
        self.images_dir().join(reference).join(IMAGE_ARCHIVE)
    }

    /// Read `spec.yaml`
    pub fn read_spec(&self) -> Result<Spec> {
        let path = self.spec_path();
        if !path.is_file() {
            return Err(CoreError::BundleNotFound { path });
        }
        let content = std::fs::read_to_string(&path)?;
        Spec::from_yaml(&content, &path.display().to_string())
    }

    /// Write `spec.yaml`
    pub fn write_spec(&self, spec: &Spec) -> Result<PathBuf> {
        let path = self.spec_path();
        std::fs::write(&path, spec.to_yaml()?)?;
        Ok(path)
    }

    /// Locate the archive for `chart` under `charts/`
    pub fn locate_chart(&self, chart: &str) -> Result<PathBuf> {
        locate_chart(&self.charts_dir(), chart)
    }
}

/// Find `<chart>-<major>.<minor>.<patch>.<ext>` in `dir`
///
/// File names are matched in sorted order, so the first match is stable
/// when several versions are present.
pub fn locate_chart(dir: &Path, chart: &str) -> Result<PathBuf> {
    let pattern = Regex::new(&format!(
        r"^{}-\d+\.\d+\.\d+\.[a-zA-Z0-9]+$",
        regex::escape(chart)
    ))?;

    let not_found = || CoreError::ChartNotFoundInBundle {
        chart: chart.to_string(),
        dir: dir.to_path_buf(),
    };

    let entries = std::fs::read_dir(dir).map_err(|_| not_found())?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();

    names
        .into_iter()
        .find(|name| pattern.is_match(name))
        .map(|name| dir.join(name))
        .ok_or_else(not_found)
}
