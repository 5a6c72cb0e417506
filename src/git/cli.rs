//! Git CLI wrapper for branch operations.
//!
//! Uses the git CLI directly so hooks and the user's git config apply to
//! branches created from the wizard.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Low-level git command wrapper
pub struct GitCli;

impl GitCli {
    /// Execute a git command and return stdout
    async fn run_git(args: &[&str], cwd: &Path) -> Result<String> {
        debug!(?args, ?cwd, "Running git command");

        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute git command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Execute a git command, returning Ok(()) on success
    async fn run_git_silent(args: &[&str], cwd: &Path) -> Result<()> {
        Self::run_git(args, cwd).await?;
        Ok(())
    }

    /// Get the current branch name
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn current_branch(path: &Path) -> Result<String> {
        Self::run_git(&["rev-parse", "--abbrev-ref", "HEAD"], path).await
    }

    /// Local branch names, current branch first
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn local_branches(path: &Path) -> Result<Vec<String>> {
        let output = Self::run_git(
            &["for-each-ref", "--format=%(HEAD)%(refname:short)", "refs/heads"],
            path,
        )
        .await?;

        let mut current = Vec::new();
        let mut others = Vec::new();
        for line in output.lines() {
            match line.strip_prefix('*') {
                Some(name) => current.push(name.to_string()),
                None => others.push(line.trim_start().to_string()),
            }
        }
        current.append(&mut others);
        Ok(current)
    }

    /// Create a branch at `base` without switching to it
    #[instrument(skip_all, fields(path = %path.display(), branch, base))]
    pub async fn create_branch(path: &Path, branch: &str, base: &str) -> Result<()> {
        Self::run_git_silent(&["branch", branch, base], path).await
    }

    /// Create a branch at `base` and switch to it
    #[instrument(skip_all, fields(path = %path.display(), branch, base))]
    pub async fn switch_create(path: &Path, branch: &str, base: &str) -> Result<()> {
        Self::run_git_silent(&["switch", "-c", branch, base], path).await
    }

    /// Whether `name` is a valid branch name
    #[instrument(skip_all, fields(name))]
    pub async fn check_ref_format(name: &str) -> bool {
        Command::new("git")
            .args(["check-ref-format", "--branch", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Get the root of the git repository
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn repo_root(path: &Path) -> Result<PathBuf> {
        Self::run_git(&["rev-parse", "--show-toplevel"], path)
            .await
            .map(PathBuf::from)
    }
}
