use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub start_work: StartWorkConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntegrationsConfig {
    /// Connect through the bulk "Connect an Integration..." step instead of
    /// one entry per integration
    #[serde(default)]
    pub cloud_enabled: bool,
    #[serde(default)]
    pub github: GitHubIntegrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIntegrationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Environment variable holding a GitHub token (falls back to `gh auth token`)
    #[serde(default = "default_github_token_env")]
    pub token_env: String,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
}

fn default_true() -> bool {
    true
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_github_api_base() -> String {
    crate::api::github::GITHUB_API_BASE.to_string()
}

impl Default for GitHubIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_env: default_github_token_env(),
            api_base: default_github_api_base(),
        }
    }
}

/// Subscription plan used by the config-backed access checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Community,
    Pro,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub plan: Plan,
    /// Let community users through to preview features
    #[serde(default = "default_true")]
    pub allow_preview: bool,
    /// Whether the user is signed in at all
    #[serde(default = "default_true")]
    pub signed_in: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            plan: Plan::default(),
            allow_preview: true,
            signed_in: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkConfig {
    /// Slugify `<id>-<title>` when suggesting a branch name
    #[serde(default = "default_true")]
    pub slugify_branch_names: bool,
    /// Show the confirm step before starting work
    #[serde(default = "default_true")]
    pub confirm: bool,
}

impl Default for StartWorkConfig {
    fn default() -> Self {
        Self {
            slugify_branch_names: true,
            confirm: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state: String,
    /// Repositories offered by the branch sub-flow. Empty means the current
    /// directory's repository.
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to file in TUI mode (false = stderr for debugging)
    #[serde(default = "default_true")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: true,
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".startwork/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so startwork works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // User config in ~/.config/startwork/ (global defaults)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("startwork").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Project config in .startwork/
        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with STARTWORK__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("STARTWORK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .startwork/config.toml
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::project_config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create startwork config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    /// Configured repositories, resolved against the current directory
    pub fn repository_paths(&self) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_default();
        self.paths
            .repositories
            .iter()
            .map(|p| {
                let path = PathBuf::from(p);
                if path.is_absolute() {
                    path
                } else {
                    cwd.join(path)
                }
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            integrations: IntegrationsConfig::default(),
            access: AccessConfig::default(),
            start_work: StartWorkConfig::default(),
            telemetry: TelemetryConfig::default(),
            paths: PathsConfig {
                state: ".startwork".to_string(),
                repositories: Vec::new(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.integrations.cloud_enabled);
        assert!(config.integrations.github.enabled);
        assert_eq!(config.integrations.github.token_env, "GITHUB_TOKEN");
        assert_eq!(config.access.plan, Plan::Community);
        assert!(config.start_work.slugify_branch_names);
        assert!(config.start_work.confirm);
        assert!(config.telemetry.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[integrations]
cloud_enabled = true

[access]
plan = "pro"

[start_work]
confirm = false

[paths]
state = "/tmp/startwork-state"
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert!(config.integrations.cloud_enabled);
        assert_eq!(config.access.plan, Plan::Pro);
        assert!(!config.start_work.confirm);
        // untouched sections keep their defaults
        assert!(config.start_work.slugify_branch_names);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/startwork-state"));
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.start_work.slugify_branch_names = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert!(!loaded.start_work.slugify_branch_names);
    }

    #[test]
    fn test_logs_path_under_state() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();

        assert!(config.logs_path().starts_with(temp_dir.path()));
        assert!(config.logs_path().ends_with("logs"));
    }
}
