//! Error types for remote sources

use thiserror::Error;
use wsm_core::CoreError;

/// Errors talking to the channel service, chart repositories or registries
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Channel Errors ============
    #[error("Channel service at {url} is unreachable: {message}")]
    ChannelUnreachable { url: String, message: String },

    #[error("Channel service at {url} returned HTTP {status}")]
    ChannelStatus { url: String, status: u16 },

    #[error("Failed to parse spec returned by {url}: {message}")]
    SpecParse { url: String, message: String },

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timed out")]
    Timeout,

    // ============ Chart Repository Errors ============
    #[error("Invalid index format: {message}")]
    IndexParseError { message: String },

    #[error("Chart not found: {name} in repository {repo}")]
    ChartNotFound { name: String, repo: String },

    #[error("Version not found: {name}@{version} in repository {repo}")]
    VersionNotFound {
        name: String,
        version: String,
        repo: String,
    },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Chart cache unavailable: {message}")]
    CacheError { message: String },

    // ============ Registry Errors ============
    #[error("No semver tags found for {repository}")]
    NoValidTags { repository: String },

    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("Invalid image reference: {reference}")]
    InvalidImageReference { reference: String },

    #[error("Invalid platform '{platform}', expected os/arch[/variant]")]
    InvalidPlatform { platform: String },

    // ============ Other ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
