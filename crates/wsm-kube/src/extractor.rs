//! Container image discovery
//!
//! Images are found by rendering a chart with the values it will be
//! installed with and walking the pod specs of every rendered workload.

use serde_json::Value as JsonValue;
use std::path::Path;
use wsm_core::{Values, normalize_images};
use wsm_repo::ChartFetcher;

use crate::error::Result;
use crate::helm::ChartRenderer;
use crate::manifest::parse_documents;

/// Namespace used for offline rendering
const RENDER_NAMESPACE: &str = "default";

const CONTAINER_FIELDS: &[&str] = &["containers", "initContainers", "ephemeralContainers"];

/// Pod spec locations: Pod, workload templates, CronJob
const POD_SPEC_PATHS: &[&[&str]] = &[
    &["spec"],
    &["spec", "template", "spec"],
    &["spec", "jobTemplate", "spec", "template", "spec"],
];

pub struct ImageExtractor<'a> {
    fetcher: &'a dyn ChartFetcher,
    renderer: &'a dyn ChartRenderer,
}

impl<'a> ImageExtractor<'a> {
    pub fn new(fetcher: &'a dyn ChartFetcher, renderer: &'a dyn ChartRenderer) -> Self {
        Self { fetcher, renderer }
    }

    /// Fetch `name` from the repository at `url` (cached), render it and
    /// return its normalized images
    pub async fn extract(
        &self,
        url: &str,
        name: &str,
        version: Option<&str>,
        values: &Values,
    ) -> Result<Vec<String>> {
        let chart = self.fetcher.fetch(url, name, version).await?;
        self.extract_from_path(&chart, name, values).await
    }

    /// Render a chart already on disk and return its normalized images
    pub async fn extract_from_path(
        &self,
        chart: &Path,
        release: &str,
        values: &Values,
    ) -> Result<Vec<String>> {
        let manifest = self
            .renderer
            .render(release, chart, RENDER_NAMESPACE, values)
            .await?;
        let images = images_in_manifest(&manifest)?;
        tracing::debug!(chart = %chart.display(), count = images.len(), "images extracted");
        Ok(images)
    }
}

/// Every container image referenced by a rendered manifest, normalized,
/// sorted and deduplicated
pub fn images_in_manifest(manifest: &str) -> Result<Vec<String>> {
    let mut images = Vec::new();

    for document in parse_documents(manifest)? {
        for path in POD_SPEC_PATHS {
            let Some(pod_spec) = lookup(&document, path) else {
                continue;
            };
            for field in CONTAINER_FIELDS {
                let Some(containers) = pod_spec.get(*field).and_then(JsonValue::as_array) else {
                    continue;
                };
                images.extend(
                    containers
                        .iter()
                        .filter_map(|c| c.get("image").and_then(JsonValue::as_str))
                        .map(str::to_string),
                );
            }
        }
    }

    Ok(normalize_images(images))
}

fn lookup<'v>(value: &'v JsonValue, path: &[&str]) -> Option<&'v JsonValue> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}
