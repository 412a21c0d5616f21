//! Spec resolution: bundle directory first, release channel otherwise

use std::path::Path;
use wsm_core::{Bundle, Spec};

use crate::channel::ChannelSource;
use crate::error::Result;

pub struct SpecResolver<'a> {
    channel: &'a dyn ChannelSource,
}

impl<'a> SpecResolver<'a> {
    pub fn new(channel: &'a dyn ChannelSource) -> Self {
        Self { channel }
    }

    /// Produce the effective spec
    ///
    /// With a bundle, `spec.yaml` is read and the channel is never contacted.
    pub async fn resolve(&self, bundle: Option<&Path>, license: Option<&str>) -> Result<Spec> {
        match bundle {
            Some(root) => {
                let bundle = Bundle::open(root)?;
                let spec = bundle.read_spec()?;
                tracing::info!(bundle = %root.display(), "spec resolved from bundle");
                Ok(spec)
            }
            None => {
                let spec = self.channel.fetch_spec(license).await?;
                tracing::info!("spec resolved from release channel");
                Ok(spec)
            }
        }
    }
}
