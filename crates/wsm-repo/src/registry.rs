//! Container registry access
//!
//! - [`RegistryClient`] finds the newest release tag of an image on Docker Hub
//! - [`ImagePuller`] pulls an image for one platform and stores it as an OCI
//!   image layout inside a `.tgz`

use flate2::Compression;
use flate2::write::GzEncoder;
use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol, ImageData};
use oci_distribution::manifest::ImageIndexEntry;
use oci_distribution::secrets::RegistryAuth;
use semver::Version;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tar::{Builder, Header};

use crate::error::{RepoError, Result};
use crate::http::compute_digest;

/// Layer media types accepted when pulling
pub mod media_types {
    pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
    pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
    pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
}

/// Docker Hub tag listing client
pub struct RegistryClient {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl RegistryClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wsm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    /// Highest semver tag of `repository`, ignoring `latest`
    pub async fn latest_tag(&self, repository: &str) -> Result<String> {
        let url = format!(
            "{}/v2/repositories/{}/tags/",
            self.api_base.trim_end_matches('/'),
            repository
        );
        tracing::debug!(%url, "listing image tags");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }

        let page: TagPage = response.json().await?;
        latest_version(page.results.iter().map(|t| t.name.as_str()))
            .map(|v| v.to_string())
            .ok_or_else(|| RepoError::NoValidTags {
                repository: repository.to_string(),
            })
    }
}

/// Highest version among `tags`; `latest` and non-semver tags are skipped
pub fn latest_version<'a>(tags: impl IntoIterator<Item = &'a str>) -> Option<Version> {
    tags.into_iter()
        .filter(|tag| *tag != "latest")
        .filter_map(|tag| Version::parse(tag.trim_start_matches('v')).ok())
        .max()
}

/// Target platform, e.g. `linux/amd64` or `linux/arm64/v8`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

impl FromStr for Platform {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RepoError::InvalidPlatform {
            platform: s.to_string(),
        };
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [os, arch] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

impl Platform {
    /// Whether a multi-arch index entry targets this platform
    pub fn matches(&self, entry: &ImageIndexEntry) -> bool {
        let Some(platform) = &entry.platform else {
            return false;
        };
        platform.os == self.os
            && platform.architecture == self.architecture
            && match &self.variant {
                Some(variant) => platform.variant.as_deref() == Some(variant.as_str()),
                None => true,
            }
    }
}

/// Pulls images anonymously for a fixed platform
pub struct ImagePuller {
    client: Client,
    auth: RegistryAuth,
    platform: Platform,
}

impl ImagePuller {
    pub fn new(platform: Platform) -> Self {
        let resolver_platform = platform.clone();
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            platform_resolver: Some(Box::new(move |entries: &[ImageIndexEntry]| {
                entries
                    .iter()
                    .find(|entry| resolver_platform.matches(entry))
                    .map(|entry| entry.digest.clone())
            })),
            ..Default::default()
        };

        Self {
            client: Client::new(config),
            auth: RegistryAuth::Anonymous,
            platform,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Pull `reference` and write it to `dest` as a gzipped OCI image layout
    pub async fn pull_to(&self, reference: &str, dest: &Path) -> Result<()> {
        let parsed =
            Reference::try_from(reference).map_err(|e| RepoError::InvalidImageReference {
                reference: format!("{}: {}", reference, e),
            })?;

        tracing::debug!(%reference, platform = %self.platform, "pulling image");
        let image = self
            .client
            .pull(
                &parsed,
                &self.auth,
                vec![
                    media_types::OCI_LAYER_GZIP,
                    media_types::OCI_LAYER,
                    media_types::DOCKER_LAYER_GZIP,
                ],
            )
            .await
            .map_err(|e| RepoError::OciError {
                message: format!("Failed to pull {}: {}", reference, e),
            })?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_image_layout(reference, &image, dest)
    }
}

/// Write `oci-layout`, `index.json` and `blobs/sha256/*` into a tar.gz
fn write_image_layout(reference: &str, image: &ImageData, dest: &Path) -> Result<()> {
    let manifest = image.manifest.as_ref().ok_or_else(|| RepoError::OciError {
        message: format!("No manifest returned for {}", reference),
    })?;
    let manifest_bytes = serde_json::to_vec(manifest)?;
    let manifest_digest = compute_digest(&manifest_bytes);
    let manifest_media_type = manifest
        .media_type
        .clone()
        .unwrap_or_else(|| media_types::OCI_MANIFEST.to_string());

    let index = json!({
        "schemaVersion": 2,
        "manifests": [{
            "mediaType": manifest_media_type,
            "digest": manifest_digest,
            "size": manifest_bytes.len(),
            "annotations": {"org.opencontainers.image.ref.name": reference},
        }],
    });

    let file = std::fs::File::create(dest)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    add_bytes(&mut builder, "oci-layout", br#"{"imageLayoutVersion":"1.0.0"}"#)?;
    add_bytes(&mut builder, "index.json", &serde_json::to_vec(&index)?)?;
    add_blob(&mut builder, &manifest_bytes)?;
    add_blob(&mut builder, &image.config.data)?;
    for layer in &image.layers {
        add_blob(&mut builder, &layer.data)?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

fn add_blob<W: Write>(builder: &mut Builder<W>, data: &[u8]) -> Result<()> {
    let digest = compute_digest(data);
    let hex = digest.trim_start_matches("sha256:");
    add_bytes(builder, &format!("blobs/sha256/{}", hex), data)
}

fn add_bytes<W: Write>(builder: &mut Builder<W>, path: &str, content: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder.append_data(&mut header, path, content)?;
    Ok(())
}
