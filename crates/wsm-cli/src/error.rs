//! CLI error type
//!
//! Library errors are flattened into a [`CliError`] carrying a diagnostic
//! code and, where a likely fix is known, a help line.

use miette::Diagnostic;
use thiserror::Error;
use wsm_core::CoreError;
use wsm_kube::{DeployStage, KubeError};
use wsm_repo::RepoError;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Deploy stopped at a stage; earlier stages are not rolled back
    #[error("Deploy failed while {stage}: {message}")]
    #[diagnostic(code(wsm::deploy))]
    Deploy {
        stage: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Spec could not be obtained from the channel or the bundle
    #[error("Spec error: {message}")]
    #[diagnostic(code(wsm::spec))]
    Spec {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart lookup, download or load failed
    #[error("Chart error: {message}")]
    #[diagnostic(code(wsm::chart))]
    Chart {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Values file or values merge problem
    #[error("Values error: {message}")]
    #[diagnostic(code(wsm::values))]
    Values { message: String },

    /// Kubernetes or helm failure
    #[error("Cluster error: {message}")]
    #[diagnostic(code(wsm::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Offline bundle could not be written
    #[error("Bundle error: {message}")]
    #[diagnostic(code(wsm::bundle))]
    Bundle { message: String },

    /// Image lookup or pull failed
    #[error("Image error: {message}")]
    #[diagnostic(code(wsm::image))]
    Image { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(wsm::io))]
    Io { message: String },

    #[error("{message}")]
    #[diagnostic(code(wsm::error))]
    Other { message: String },
}

impl CliError {
    /// Every failure exits with the same code
    pub fn exit_code(&self) -> i32 {
        exit_codes::ERROR
    }

    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
        }
    }

    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

fn kubeconfig_help() -> Option<String> {
    Some("check that KUBECONFIG points at the target cluster".to_string())
}

fn helm_help() -> Option<String> {
    Some("wsm runs `helm` from PATH; set WSM_HELM_BIN to use another binary".to_string())
}

/// Help for the innermost error of a failed deploy
fn deploy_help(stage: DeployStage, source: &KubeError) -> Option<String> {
    match source {
        KubeError::Repo(RepoError::ChannelUnreachable { .. } | RepoError::ChannelStatus { .. }) => {
            Some("check --channel-url and --license, or deploy from a bundle with --bundle".to_string())
        }
        KubeError::Repo(RepoError::Core(CoreError::BundleNotFound { .. })) => {
            Some("create a bundle with `wsm download`".to_string())
        }
        KubeError::Core(CoreError::ChartNotFoundInBundle { .. }) => {
            Some("pass the chart explicitly with --chart or --operator-chart".to_string())
        }
        KubeError::Core(CoreError::ValuesFileNotFound { .. }) => None,
        KubeError::ChartInstall { .. } | KubeError::ChartRender { .. } => helm_help(),
        KubeError::Api(_) | KubeError::ConfigStage { .. } | KubeError::ResourceApply { .. } => {
            kubeconfig_help()
        }
        _ if stage == DeployStage::ResolvingSpec => {
            Some("the deployment spec comes from the release channel unless --bundle is given".to_string())
        }
        _ => None,
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Deploy { stage, source } => CliError::Deploy {
                stage: stage.to_string(),
                help: deploy_help(stage, &source),
                message: source.to_string(),
            },
            KubeError::Core(e) => e.into(),
            KubeError::Repo(e) => e.into(),
            KubeError::ChartInstall { .. } | KubeError::ChartRender { .. } => CliError::Cluster {
                message: err.to_string(),
                help: helm_help(),
            },
            KubeError::Io(e) => e.into(),
            other => CliError::Cluster {
                message: other.to_string(),
                help: kubeconfig_help(),
            },
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::ChannelUnreachable { .. }
            | RepoError::ChannelStatus { .. }
            | RepoError::SpecParse { .. } => CliError::Spec {
                message: err.to_string(),
                help: Some("check --channel-url and --license".to_string()),
            },
            RepoError::ChartNotFound { .. }
            | RepoError::VersionNotFound { .. }
            | RepoError::IntegrityCheckFailed { .. }
            | RepoError::IndexParseError { .. } => CliError::Chart {
                message: err.to_string(),
                help: None,
            },
            RepoError::NoValidTags { .. }
            | RepoError::OciError { .. }
            | RepoError::InvalidImageReference { .. }
            | RepoError::InvalidPlatform { .. } => CliError::Image {
                message: err.to_string(),
            },
            RepoError::Core(e) => e.into(),
            RepoError::Io(e) => e.into(),
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BundleNotFound { .. } | CoreError::SpecParse { .. } => CliError::Spec {
                message: err.to_string(),
                help: None,
            },
            CoreError::ChartNotFoundInBundle { .. } | CoreError::InvalidChart { .. } => {
                CliError::Chart {
                    message: err.to_string(),
                    help: None,
                }
            }
            CoreError::TypeConflict { .. }
            | CoreError::NotAMapping { .. }
            | CoreError::InvalidPath { .. }
            | CoreError::ValuesFileNotFound { .. } => CliError::Values {
                message: err.to_string(),
            },
            CoreError::Io(e) => e.into(),
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
