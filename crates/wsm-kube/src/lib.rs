//! Kubernetes side of wsm
//!
//! This crate takes a resolved deployment spec into a cluster:
//!
//! - **Staging**: airgapped installs ship the application chart in a
//!   ConfigMap ([`ChartPackager`])
//! - **Install**: charts are installed through `helm` ([`HelmCli`])
//! - **Apply**: the `WeightsAndBiases` resource is server-side applied for
//!   the operator to reconcile ([`Cluster`])
//! - **Orchestration**: [`Orchestrator`] runs the deploy stages in order
//! - **Images**: [`ImageExtractor`] lists the images a chart will run
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsm_kube::{DeployOptions, HelmCli, KubeCluster, Orchestrator};
//! use wsm_repo::{ChannelClient, ChartCache, ChartRepository, DEFAULT_CHANNEL_URL};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = ChannelClient::new(DEFAULT_CHANNEL_URL)?;
//! let charts = ChartRepository::new(ChartCache::open_default()?)?;
//! let helm = HelmCli::from_env();
//! let cluster = KubeCluster::new();
//!
//! let report = Orchestrator::new(&channel, &charts, &helm, &cluster)
//!     .deploy(&DeployOptions::default())
//!     .await?;
//! println!("{:?}", report.chart);
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod crd;
pub mod error;
pub mod extractor;
pub mod helm;
pub mod manifest;
pub mod mock;
pub mod orchestrator;
pub mod packager;
pub mod progress;

pub use cluster::{Cluster, KubeCluster};
pub use crd::{FIELD_MANAGER, WeightsAndBiases, WeightsAndBiasesSpec};
pub use error::{KubeError, Result};
pub use extractor::{ImageExtractor, images_in_manifest};
pub use helm::{ChartInstaller, ChartRenderer, HELM_BIN_ENV, HelmCli};
pub use orchestrator::{
    DEFAULT_NAMESPACE, DeployOptions, DeployReport, DeployStage, DeployStrategy, NoopObserver,
    OPERATOR_RELEASE, Orchestrator, StageObserver,
};
pub use packager::{CHARTS_CONFIG_MAP, ChartPackager, StagedChart};
pub use progress::DeploySpinner;
