//! Deploy orchestration
//!
//! A deploy walks a fixed sequence of stages:
//!
//! ```text
//! ResolvingSpec -> ResolvingCharts -> [StagingConfig] -> InstallingOperator
//!     -> ApplyingResource -> Done
//! ```
//!
//! `StagingConfig` only runs for airgapped installs. With the
//! [`DeployStrategy::Helm`] strategy the application chart is installed
//! directly (`InstallingChart`) and the operator is never involved.
//!
//! A failing stage ends the deploy. Nothing already done is rolled back; the
//! error carries the stage it happened in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wsm_core::{Bundle, ChartArchive, ChartRef, CoreError, LocalValues, Spec, Values};
use wsm_repo::{
    ChannelSource, ChartFetcher, OPERATOR_CHART, SpecResolver, WANDB_CHART, WANDB_HELM_REPO_URL,
};

use crate::cluster::Cluster;
use crate::crd::{KIND, RESOURCE_NAME, WeightsAndBiases};
use crate::error::{KubeError, Result};
use crate::helm::ChartInstaller;
use crate::packager::{ChartPackager, StagedChart};

/// Namespace the operator (or the application, with the helm strategy) is
/// installed into
pub const DEFAULT_NAMESPACE: &str = "wandb";

/// Release name of the operator chart
pub const OPERATOR_RELEASE: &str = "operator";

/// Release name of the application chart with the helm strategy
pub const APP_RELEASE: &str = "wandb";

/// Time the operator gets to register its CRD before the resource is applied
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    ResolvingSpec,
    ResolvingCharts,
    StagingConfig,
    InstallingOperator,
    InstallingChart,
    ApplyingResource,
    Done,
    Failed,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployStage::ResolvingSpec => "resolving spec",
            DeployStage::ResolvingCharts => "resolving charts",
            DeployStage::StagingConfig => "staging chart config",
            DeployStage::InstallingOperator => "installing operator",
            DeployStage::InstallingChart => "installing chart",
            DeployStage::ApplyingResource => "applying resource",
            DeployStage::Done => "done",
            DeployStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// How the application reaches the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeployStrategy {
    /// Install the operator and hand it a `WeightsAndBiases` resource
    #[default]
    Operator,
    /// Install the application chart directly
    Helm,
}

/// Everything a single deploy needs to know
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub namespace: String,
    pub airgapped: bool,
    pub strategy: DeployStrategy,
    /// Offline bundle root (`spec.yaml`, `charts/`)
    pub bundle: Option<PathBuf>,
    /// Application chart, overrides the bundle
    pub chart: Option<PathBuf>,
    /// Operator chart, overrides the bundle
    pub operator_chart: Option<PathBuf>,
    pub values_file: Option<PathBuf>,
    pub license: Option<String>,
    /// Repository the operator chart is fetched from when no path is known
    pub helm_repo_url: String,
    pub settle_delay: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            airgapped: false,
            strategy: DeployStrategy::default(),
            bundle: None,
            chart: None,
            operator_chart: None,
            values_file: None,
            license: None,
            helm_repo_url: WANDB_HELM_REPO_URL.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Receives every stage transition, including the final `Done` or `Failed`
pub trait StageObserver: Send + Sync {
    fn on_stage(&self, stage: DeployStage);
}

pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn on_stage(&self, _stage: DeployStage) {}
}

/// Outcome of a successful deploy
#[derive(Debug, Clone, PartialEq)]
pub struct DeployReport {
    pub strategy: DeployStrategy,
    /// Chart reference the application was deployed with
    pub chart: ChartRef,
    pub staged_chart: Option<StagedChart>,
    pub operator_installed: bool,
    pub resource_applied: bool,
}

/// Chart paths known before anything is fetched
#[derive(Debug, Default)]
struct LocalCharts {
    app: Option<PathBuf>,
    operator: Option<PathBuf>,
}

pub struct Orchestrator<'a> {
    channel: &'a dyn ChannelSource,
    fetcher: &'a dyn ChartFetcher,
    installer: &'a dyn ChartInstaller,
    cluster: &'a dyn Cluster,
    observer: &'a dyn StageObserver,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        channel: &'a dyn ChannelSource,
        fetcher: &'a dyn ChartFetcher,
        installer: &'a dyn ChartInstaller,
        cluster: &'a dyn Cluster,
    ) -> Self {
        Self {
            channel,
            fetcher,
            installer,
            cluster,
            observer: &NoopObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn StageObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Run a deploy to completion
    pub async fn deploy(&self, options: &DeployOptions) -> Result<DeployReport> {
        match self.run(options).await {
            Ok(report) => {
                self.enter(DeployStage::Done);
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "deploy failed");
                self.observer.on_stage(DeployStage::Failed);
                Err(e)
            }
        }
    }

    async fn run(&self, options: &DeployOptions) -> Result<DeployReport> {
        self.enter(DeployStage::ResolvingSpec);
        let spec = SpecResolver::new(self.channel)
            .resolve(options.bundle.as_deref(), options.license.as_deref())
            .await
            .map_err(failed_at(DeployStage::ResolvingSpec))?;

        self.enter(DeployStage::ResolvingCharts);
        let charts = resolve_local_charts(options).map_err(failed_at(DeployStage::ResolvingCharts))?;
        let (app_values, operator_values) = resolve_values(&spec, options.values_file.as_deref())
            .map_err(failed_at(DeployStage::ResolvingCharts))?;

        match options.strategy {
            DeployStrategy::Helm => {
                self.enter(DeployStage::InstallingChart);
                self.install_app(&spec, charts.app, &app_values, options)
                    .await
                    .map_err(failed_at(DeployStage::InstallingChart))?;

                Ok(DeployReport {
                    strategy: DeployStrategy::Helm,
                    chart: spec.chart.clone(),
                    staged_chart: None,
                    operator_installed: false,
                    resource_applied: false,
                })
            }
            DeployStrategy::Operator => {
                let mut operator_values = operator_values;
                let mut staged_chart = None;

                if options.airgapped {
                    self.enter(DeployStage::StagingConfig);
                    let staged = self
                        .stage_app(&spec, charts.app, options)
                        .await
                        .map_err(failed_at(DeployStage::StagingConfig))?;
                    operator_values
                        .set("airgapped", true)
                        .map_err(failed_at(DeployStage::StagingConfig))?;
                    staged_chart = Some(staged);
                }

                self.enter(DeployStage::InstallingOperator);
                self.install_operator(charts.operator, &operator_values, options)
                    .await
                    .map_err(failed_at(DeployStage::InstallingOperator))?;

                self.enter(DeployStage::ApplyingResource);
                let chart = match &staged_chart {
                    Some(staged) => ChartRef::local(&staged.in_cluster_path),
                    None => spec.chart.to_remote(),
                };
                self.apply_resource(chart.clone(), app_values)
                    .await
                    .map_err(failed_at(DeployStage::ApplyingResource))?;

                Ok(DeployReport {
                    strategy: DeployStrategy::Operator,
                    chart,
                    staged_chart,
                    operator_installed: true,
                    resource_applied: true,
                })
            }
        }
    }

    fn enter(&self, stage: DeployStage) {
        tracing::info!(%stage, "deploy stage");
        self.observer.on_stage(stage);
    }

    async fn install_app(
        &self,
        spec: &Spec,
        local: Option<PathBuf>,
        values: &Values,
        options: &DeployOptions,
    ) -> Result<()> {
        let path = match local {
            Some(path) => path,
            None => self.fetch_spec_chart(&spec.chart).await?,
        };
        let chart = ChartArchive::load(&path)?;
        tracing::debug!(name = %chart.name(), version = %chart.version(), "application chart loaded");

        self.installer
            .install(APP_RELEASE, &chart.path, &options.namespace, values)
            .await
    }

    async fn stage_app(
        &self,
        spec: &Spec,
        local: Option<PathBuf>,
        options: &DeployOptions,
    ) -> Result<StagedChart> {
        let path = match local {
            Some(path) => path,
            None => self.fetch_spec_chart(&spec.chart).await?,
        };
        let name = spec.chart.name.as_deref().unwrap_or(WANDB_CHART);

        ChartPackager::new(self.cluster)
            .stage_for_airgap(&path, name, &options.namespace)
            .await
    }

    async fn install_operator(
        &self,
        local: Option<PathBuf>,
        values: &Values,
        options: &DeployOptions,
    ) -> Result<()> {
        let path = match local {
            Some(path) => path,
            None => {
                self.fetcher
                    .fetch(&options.helm_repo_url, OPERATOR_CHART, None)
                    .await?
            }
        };
        let chart = ChartArchive::load(&path)?;
        tracing::debug!(version = %chart.version(), "operator chart loaded");

        self.installer
            .install(OPERATOR_RELEASE, &chart.path, &options.namespace, values)
            .await?;

        if !options.settle_delay.is_zero() {
            tracing::debug!(delay = ?options.settle_delay, "waiting for operator");
            tokio::time::sleep(options.settle_delay).await;
        }
        Ok(())
    }

    async fn apply_resource(&self, chart: ChartRef, values: Values) -> Result<()> {
        let resource = WeightsAndBiases::for_chart(chart, values);
        self.cluster
            .apply_custom_resource(&resource)
            .await
            .map_err(|e| KubeError::ResourceApply {
                kind: KIND.to_string(),
                name: RESOURCE_NAME.to_string(),
                source: Box::new(e),
            })
    }

    async fn fetch_spec_chart(&self, chart: &ChartRef) -> Result<PathBuf> {
        let (Some(url), Some(name)) = (chart.url.as_deref(), chart.name.as_deref()) else {
            return Err(KubeError::ChartUnresolved {
                message: "no local chart and the deployment spec has no chart url and name".to_string(),
            });
        };
        Ok(self
            .fetcher
            .fetch(url, name, chart.version.as_deref())
            .await?)
    }
}

/// Chart paths from flags, then from the bundle
///
/// Bundle lookups only happen for charts the flags leave open; a bundle that
/// lacks one is an error.
fn resolve_local_charts(options: &DeployOptions) -> std::result::Result<LocalCharts, CoreError> {
    let bundle = options.bundle.as_deref().map(Bundle::open).transpose()?;
    let needs_app = options.airgapped || options.strategy == DeployStrategy::Helm;
    let needs_operator = options.strategy == DeployStrategy::Operator;

    let pick = |flag: &Option<PathBuf>, needed: bool, chart: &str| match (flag, &bundle) {
        (Some(path), _) => Ok(Some(path.clone())),
        (None, Some(bundle)) if needed => bundle.locate_chart(chart).map(Some),
        _ => Ok(None),
    };

    Ok(LocalCharts {
        app: pick(&options.chart, needs_app, WANDB_CHART)?,
        operator: pick(&options.operator_chart, needs_operator, OPERATOR_CHART)?,
    })
}

/// Application values (channel values overridden by the values file) and
/// operator values
fn resolve_values(
    spec: &Spec,
    values_file: Option<&Path>,
) -> std::result::Result<(Values, Values), CoreError> {
    let local = match values_file {
        Some(path) => LocalValues::from_file(path)?,
        None => LocalValues::default(),
    };
    let app = spec.values.merge(&local.app)?;
    Ok((app, local.operator))
}

fn failed_at<E: Into<KubeError>>(stage: DeployStage) -> impl FnOnce(E) -> KubeError {
    move |e| KubeError::Deploy {
        stage,
        source: Box::new(e.into()),
    }
}
