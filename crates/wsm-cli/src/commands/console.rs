//! Console command: port-forward to the W&B console and log in

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::ffi::OsString;
use std::time::Duration;
use tokio::process::Command;
use wsm_kube::{Cluster, KubeCluster};

use crate::display;
use crate::error::{CliError, Result};

/// Environment variable overriding the kubectl binary
pub const KUBECTL_BIN_ENV: &str = "WSM_KUBECTL_BIN";

const PASSWORD_SECRET: &str = "wandb-password";
const PASSWORD_NAMESPACE: &str = "default";
const PASSWORD_KEY: &str = "password";

const CONSOLE_SERVICE: &str = "service/wandb-console";
const PORT_MAPPING: &str = "8080:8082";
const LOGIN_URL: &str = "http://localhost:8080/console/login";

/// Time given to the port-forward before the browser opens
const BROWSER_DELAY: Duration = Duration::from_millis(500);

pub async fn run() -> Result<()> {
    let cluster = KubeCluster::new();
    let password = cluster
        .read_secret(PASSWORD_NAMESPACE, PASSWORD_SECRET, PASSWORD_KEY)
        .await?;
    let url = login_url(&password);

    display::step(format!("Console available at {}", url));

    tokio::spawn(async move {
        tokio::time::sleep(BROWSER_DELAY).await;
        if let Err(e) = open_browser(&url).await {
            tracing::warn!(error = %e, "could not open browser");
        }
    });

    let kubectl = std::env::var_os(KUBECTL_BIN_ENV).unwrap_or_else(|| OsString::from("kubectl"));
    let status = Command::new(&kubectl)
        .args(["port-forward", CONSOLE_SERVICE, PORT_MAPPING])
        .status()
        .await
        .map_err(|e| CliError::cluster(format!("failed to run kubectl: {}", e)))?;

    if !status.success() {
        return Err(CliError::cluster(format!("kubectl port-forward exited with {}", status)));
    }
    Ok(())
}

/// Login URL carrying the base64 password as a query parameter
fn login_url(password: &[u8]) -> String {
    let encoded = STANDARD.encode(password);
    let query: String = url::form_urlencoded::byte_serialize(encoded.as_bytes()).collect();
    format!("{LOGIN_URL}?password={query}")
}

async fn open_browser(url: &str) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/c", "start"]);
        c
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    command.arg(url).status().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_password() {
        // base64("s3cret?>") is "czNjcmV0Pz4=", whose '=' must be escaped
        assert_eq!(
            login_url(b"s3cret?>"),
            "http://localhost:8080/console/login?password=czNjcmV0Pz4%3D"
        );
    }

    #[test]
    fn test_login_url_plus_and_slash() {
        // 0xfb 0xff encodes to "+/8="
        assert_eq!(
            login_url(&[0xfb, 0xff]),
            "http://localhost:8080/console/login?password=%2B%2F8%3D"
        );
    }
}
