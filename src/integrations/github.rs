//! GitHub integration backed by the REST client and the `gh` CLI login

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{Integration, IntegrationError, IntegrationId, IssueRef};
use crate::api::{ApiError, GhCli, GitHubClient};
use crate::config::GitHubIntegrationConfig;

#[derive(Default)]
struct GitHubState {
    connected: Option<bool>,
    client: Option<GitHubClient>,
}

pub struct GitHubIntegration {
    token_env: String,
    api_base: String,
    state: Mutex<GitHubState>,
}

impl GitHubIntegration {
    pub fn from_config(config: &GitHubIntegrationConfig) -> Self {
        Self {
            token_env: config.token_env.clone(),
            api_base: config.api_base.clone(),
            state: Mutex::new(GitHubState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GitHubState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Token from the configured env var, falling back to the gh CLI store
    async fn resolve_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var(&self.token_env) {
            if !token.trim().is_empty() {
                debug!(env = %self.token_env, "Using GitHub token from environment");
                return Some(token);
            }
        }

        match GhCli::auth_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                debug!(error = %e, "No gh CLI token available");
                None
            }
        }
    }

    async fn client(&self) -> Result<GitHubClient, IntegrationError> {
        if let Some(client) = self.lock().client.clone() {
            return Ok(client);
        }

        let token = self
            .resolve_token()
            .await
            .ok_or_else(|| ApiError::not_configured(IntegrationId::GitHub.to_string()))?;
        let client = GitHubClient::new(token, self.api_base.clone())?;
        self.lock().client = Some(client.clone());
        Ok(client)
    }

    fn set_connected(&self, connected: bool) {
        let mut state = self.lock();
        state.connected = Some(connected);
        if !connected {
            state.client = None;
        }
    }
}

#[async_trait]
impl Integration for GitHubIntegration {
    fn id(&self) -> IntegrationId {
        IntegrationId::GitHub
    }

    fn maybe_connected(&self) -> Option<bool> {
        self.lock().connected
    }

    #[instrument(skip_all, fields(integration = "github"))]
    async fn is_connected(&self) -> Result<bool, IntegrationError> {
        let client = match self.client().await {
            Ok(client) => client,
            Err(IntegrationError::Api(ApiError::NotConfigured { .. })) => {
                self.set_connected(false);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let connected = client.test_connection().await?;
        self.set_connected(connected);
        Ok(connected)
    }

    #[instrument(skip(self), fields(integration = "github"))]
    async fn connect(&self, source: &str) -> Result<bool, IntegrationError> {
        if !GhCli::is_installed().await {
            warn!("gh CLI is not installed; set the token env var instead");
            self.set_connected(false);
            return Ok(false);
        }

        if !GhCli::check_auth().await && !GhCli::login_web().await? {
            info!("gh auth login did not complete");
            self.set_connected(false);
            return Ok(false);
        }

        // Drop any client built from a stale token
        self.lock().client = None;
        self.is_connected().await
    }

    #[instrument(skip_all, fields(integration = "github"))]
    async fn get_my_issues(&self) -> Result<Vec<IssueRef>, IntegrationError> {
        let client = self.client().await?;
        match client.get_my_issues().await {
            Ok(issues) => Ok(issues),
            Err(e) => {
                if e.is_auth_error() {
                    self.set_connected(false);
                }
                Err(e.into())
            }
        }
    }
}
