//! Helm chart install and render
//!
//! Charts are Go templates, so wsm drives the `helm` binary rather than
//! rendering them itself. Values are always passed on stdin.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use wsm_core::Values;

use crate::error::{KubeError, Result};

/// Environment variable overriding the helm binary
pub const HELM_BIN_ENV: &str = "WSM_HELM_BIN";

/// Installs or upgrades a chart as a named release
#[async_trait]
pub trait ChartInstaller: Send + Sync {
    async fn install(
        &self,
        release: &str,
        chart: &Path,
        namespace: &str,
        values: &Values,
    ) -> Result<()>;
}

/// Renders a chart into a multi-document manifest
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(
        &self,
        release: &str,
        chart: &Path,
        namespace: &str,
        values: &Values,
    ) -> Result<String>;
}

/// `helm` CLI driver
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: OsString,
}

impl HelmCli {
    pub fn new(binary: impl Into<OsString>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `$WSM_HELM_BIN`, or `helm` from `PATH`
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(HELM_BIN_ENV).unwrap_or_else(|| OsString::from("helm")))
    }

    /// Run helm with `args`, feeding `values` as YAML to `-f -`.
    /// Returns stdout, or stderr as the error message.
    async fn run(&self, args: &[&OsStr], values: &Values) -> std::result::Result<String, String> {
        let yaml = values.to_yaml().map_err(|e| e.to_string())?;

        let mut child = Command::new(&self.binary)
            .args(args)
            .args(["-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to run {}: {}", self.binary.to_string_lossy(), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // helm may exit before reading its input
            match stdin.write_all(yaml.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(format!("failed to write values: {}", e)),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to wait for helm: {}", e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(if stderr.is_empty() {
                format!("helm exited with {}", output.status)
            } else {
                stderr
            })
        }
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl ChartInstaller for HelmCli {
    async fn install(
        &self,
        release: &str,
        chart: &Path,
        namespace: &str,
        values: &Values,
    ) -> Result<()> {
        tracing::info!(%release, %namespace, chart = %chart.display(), "installing chart");

        let args: [&OsStr; 7] = [
            "upgrade".as_ref(),
            "--install".as_ref(),
            release.as_ref(),
            chart.as_os_str(),
            "--namespace".as_ref(),
            namespace.as_ref(),
            "--create-namespace".as_ref(),
        ];

        self.run(&args, values)
            .await
            .map(|_| ())
            .map_err(|message| KubeError::ChartInstall {
                release: release.to_string(),
                namespace: namespace.to_string(),
                message,
            })
    }
}

#[async_trait]
impl ChartRenderer for HelmCli {
    async fn render(
        &self,
        release: &str,
        chart: &Path,
        namespace: &str,
        values: &Values,
    ) -> Result<String> {
        let args: [&OsStr; 5] = [
            "template".as_ref(),
            release.as_ref(),
            chart.as_os_str(),
            "--namespace".as_ref(),
            namespace.as_ref(),
        ];

        self.run(&args, values)
            .await
            .map_err(|message| KubeError::ChartRender {
                chart: chart.display().to_string(),
                message,
            })
    }
}
