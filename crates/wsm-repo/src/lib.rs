//! wsm remote sources
//!
//! This crate provides everything wsm fetches over the network:
//!
//! - **Release channel**: the deployment spec recommended for a license
//! - **Helm repositories**: `index.yaml` lookup and chart downloads into a
//!   host-side cache
//! - **Container registries**: latest release tags and image pulls for
//!   offline bundles
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsm_repo::{ChannelClient, SpecResolver, DEFAULT_CHANNEL_URL};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = ChannelClient::new(DEFAULT_CHANNEL_URL)?;
//! let spec = SpecResolver::new(&channel).resolve(None, None).await?;
//! println!("{:?}", spec.chart);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod index;
pub mod registry;
pub mod resolver;

pub use channel::{ChannelClient, ChannelSource};
pub use config::{
    CHANNEL_URL_ENV, CONTROLLER_IMAGE, ChartCache, DEFAULT_CHANNEL_URL, Endpoints, OPERATOR_CHART,
    WANDB_CHART, WANDB_HELM_REPO_URL,
};
pub use error::{RepoError, Result};
pub use http::{ChartFetcher, ChartRepository};
pub use index::{ChartEntry, RepositoryIndex};
pub use registry::{ImagePuller, Platform, RegistryClient};
pub use resolver::SpecResolver;
