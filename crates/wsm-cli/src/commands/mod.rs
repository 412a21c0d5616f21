//! CLI commands

pub mod console;
pub mod deploy;
pub mod download;
pub mod list;
pub mod migrate;

use serde_json::Value as JsonValue;
use std::path::PathBuf;
use wsm_core::{Spec, Values};
use wsm_kube::{HelmCli, ImageExtractor};
use wsm_repo::{
    CONTROLLER_IMAGE, ChannelClient, ChartCache, ChartFetcher, ChartRepository, Endpoints,
    OPERATOR_CHART, RegistryClient, SpecResolver,
};

use crate::error::{CliError, Result};

/// Settings shared by every command
pub struct Context {
    pub endpoints: Endpoints,
    pub license: Option<String>,
}

impl Context {
    pub fn channel(&self) -> Result<ChannelClient> {
        Ok(ChannelClient::new(&self.endpoints.channel_url)?)
    }

    /// Chart repository client backed by `~/.wandb/charts`
    pub fn chart_repository(&self) -> Result<ChartRepository> {
        Ok(ChartRepository::new(ChartCache::open_default()?)?)
    }
}

/// Charts and images for the current channel spec
pub struct ImageSets {
    pub spec: Spec,
    pub operator_chart: PathBuf,
    pub app_chart: PathBuf,
    pub operator: Vec<String>,
    pub wandb: Vec<String>,
}

/// Resolve the channel spec, fetch both charts and render them for images
///
/// The operator chart is rendered with the latest controller tag, the
/// application chart with the channel values.
pub async fn collect_images(ctx: &Context) -> Result<ImageSets> {
    let channel = ctx.channel()?;
    let spec = SpecResolver::new(&channel)
        .resolve(None, ctx.license.as_deref())
        .await?;

    let charts = ctx.chart_repository()?;
    let helm = HelmCli::from_env();
    let extractor = ImageExtractor::new(&charts, &helm);

    let tag = RegistryClient::new(&ctx.endpoints.docker_hub_api)?
        .latest_tag(CONTROLLER_IMAGE)
        .await?;
    tracing::debug!(%tag, "latest controller tag");

    let mut operator_values = Values::new();
    operator_values.set("image.tag", tag)?;
    let operator_chart = charts
        .fetch(&ctx.endpoints.helm_repo_url, OPERATOR_CHART, None)
        .await?;
    let operator = extractor
        .extract_from_path(&operator_chart, OPERATOR_CHART, &operator_values)
        .await?;

    let (Some(url), Some(name)) = (spec.chart.url.as_deref(), spec.chart.name.as_deref()) else {
        return Err(CliError::Chart {
            message: "channel spec has no chart url and name".to_string(),
            help: None,
        });
    };
    let app_chart = charts.fetch(url, name, spec.chart.version.as_deref()).await?;
    let app_values = with_weave_trace(&spec.values)?;
    let wandb = extractor
        .extract_from_path(&app_chart, name, &app_values)
        .await?;

    Ok(ImageSets {
        spec,
        operator_chart,
        app_chart,
        operator,
        wandb,
    })
}

/// Enable `weave-trace` when the values configure it
fn with_weave_trace(values: &Values) -> Result<Values> {
    let mut values = values.clone();
    if matches!(values.get("weave-trace"), Some(JsonValue::Object(_))) {
        values.set_path(&["weave-trace", "install"], true)?;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weave_trace_enabled_when_configured() {
        let values = Values::from_yaml("weave-trace:\n  image:\n    tag: 0.1.0\n").unwrap();
        let values = with_weave_trace(&values).unwrap();
        assert_eq!(values.get("weave-trace"), Some(&json!({"image": {"tag": "0.1.0"}, "install": true})));
    }

    #[test]
    fn test_weave_trace_untouched_when_absent() {
        let values = Values::from_yaml("global:\n  host: localhost\n").unwrap();
        assert_eq!(with_weave_trace(&values).unwrap(), values);
    }
}
