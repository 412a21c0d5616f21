//! Integration tests for the wsm binary
//!
//! Only paths that fail or finish before any network or cluster access are
//! exercised here.

use std::process::Command;

/// Run wsm with an unreachable channel so nothing leaves the host
fn wsm(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_wsm"))
        .args(args)
        .env("DEPLOYER_CHANNEL_URL", "http://127.0.0.1:9/channel")
        .env_remove("WANDB_LICENSE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute wsm")
}

mod help {
    use super::*;

    #[test]
    fn test_lists_commands() {
        let output = wsm(&["--help"]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        for command in ["deploy", "download", "list", "migrate", "console"] {
            assert!(stdout.contains(command), "missing {command} in help");
        }
    }

    #[test]
    fn test_deploy_hides_helm_flag() {
        let output = wsm(&["deploy", "--help"]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("--airgapped"));
        assert!(stdout.contains("--operator-chart"));
        assert!(!stdout.contains("--helm"));
    }

    #[test]
    fn test_unknown_command_fails() {
        let output = wsm(&["frobnicate"]);
        assert!(!output.status.success());
    }
}

mod deploy_command {
    use super::*;

    #[test]
    fn test_missing_bundle_exits_with_one() {
        let temp = tempfile::TempDir::new().unwrap();
        let bundle = temp.path().join("missing-bundle");

        let output = wsm(&["deploy", "--bundle", bundle.to_str().unwrap()]);

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Diagnostics may wrap, so match single words
        assert!(stderr.contains("Deploy"), "stderr: {stderr}");
        assert!(stderr.contains("resolving"), "stderr: {stderr}");
    }
}

mod list_command {
    use super::*;

    #[test]
    fn test_invalid_platform() {
        let output = wsm(&["list", "--platform", "amd64"]);

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("amd64"), "stderr: {stderr}");
    }
}

mod migrate_command {
    use super::*;

    #[test]
    fn test_missing_resource_file() {
        let output = wsm(&["migrate", "--file", "/nonexistent/wandb-cr.yaml"]);

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("read"), "stderr: {stderr}");
    }
}
