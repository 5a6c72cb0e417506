//! GitHub CLI (`gh`) wrapper for authentication.
//!
//! The gh CLI manages credentials through `gh auth login`, so connecting the
//! GitHub integration means running its login flow and reading the token it
//! stored.

use anyhow::{anyhow, Context, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// GitHub CLI wrapper
pub struct GhCli;

impl GhCli {
    /// Execute a gh command and return stdout
    async fn run_gh(args: &[&str]) -> Result<String> {
        debug!(?args, "Running gh command");

        let output = Command::new("gh")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute gh command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "gh {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Check if gh CLI is installed
    pub async fn is_installed() -> bool {
        Command::new("gh")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Check if gh CLI is authenticated
    #[instrument]
    pub async fn check_auth() -> bool {
        Self::run_gh(&["auth", "status"]).await.is_ok()
    }

    /// Token stored by `gh auth login`
    #[instrument]
    pub async fn auth_token() -> Result<String> {
        let token = Self::run_gh(&["auth", "token"]).await?;
        if token.is_empty() {
            return Err(anyhow!("gh returned an empty token"));
        }
        Ok(token)
    }

    /// Run the interactive browser login. Inherits the terminal so the user
    /// can follow the one-time code prompt.
    #[instrument]
    pub async fn login_web() -> Result<bool> {
        let status = Command::new("gh")
            .args(["auth", "login", "--web", "--hostname", "github.com"])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .context("Failed to execute gh auth login")?;

        Ok(status.success())
    }
}
