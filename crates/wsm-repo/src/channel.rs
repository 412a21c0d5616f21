//! Release channel client
//!
//! The channel service returns the deployment spec currently recommended
//! for a license as JSON.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;
use wsm_core::Spec;

use crate::error::{RepoError, Result};

/// Username paired with the license in basic auth
pub const LICENSE_USER: &str = "license";

/// Source of the remote deployment spec
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn fetch_spec(&self, license: Option<&str>) -> Result<Spec>;
}

/// HTTP client for the channel service
pub struct ChannelClient {
    url: String,
    client: reqwest::Client,
}

impl ChannelClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        Url::parse(&url).map_err(|e| RepoError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("wsm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChannelSource for ChannelClient {
    async fn fetch_spec(&self, license: Option<&str>) -> Result<Spec> {
        let mut request = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(license) = license.filter(|l| !l.is_empty()) {
            request = request.basic_auth(LICENSE_USER, Some(license));
        }

        tracing::debug!(url = %self.url, "fetching channel spec");

        let unreachable_err = |e: reqwest::Error| RepoError::ChannelUnreachable {
            url: self.url.clone(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(unreachable_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::ChannelStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(unreachable_err)?;
        let parse_err = |message: String| RepoError::SpecParse {
            url: self.url.clone(),
            message,
        };
        let spec: Spec = serde_json::from_str(&body).map_err(|e| parse_err(e.to_string()))?;
        spec.chart.check_complete().map_err(parse_err)?;
        Ok(spec)
    }
}
