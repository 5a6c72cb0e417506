//! Tracker integrations: connection state and "my issues" queries.
//!
//! The flow never talks to a tracker directly. It goes through
//! [`IntegrationRegistry`], which hands out [`Integration`] objects that cache
//! their last known connection state.

mod github;
mod mock;

pub use github::GitHubIntegration;
pub use mock::MockIntegration;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::config::Config;

/// Known tracker integrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationId {
    GitHub,
    GitLab,
    Jira,
    Linear,
}

impl IntegrationId {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            IntegrationId::GitHub => "GitHub",
            IntegrationId::GitLab => "GitLab",
            IntegrationId::Jira => "Jira",
            IntegrationId::Linear => "Linear",
        }
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationId::GitHub => write!(f, "github"),
            IntegrationId::GitLab => write!(f, "gitlab"),
            IntegrationId::Jira => write!(f, "jira"),
            IntegrationId::Linear => write!(f, "linear"),
        }
    }
}

/// Repository an issue belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRepository {
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAuthor {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// An issue as returned by a tracker. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub provider: IntegrationId,
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub url: String,
    pub repository: Option<IssueRepository>,
    pub author: IssueAuthor,
    pub updated_date: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("integration {0} is not registered")]
    NotRegistered(IntegrationId),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cli(#[from] anyhow::Error),
}

#[async_trait]
pub trait Integration: Send + Sync {
    fn id(&self) -> IntegrationId;

    /// Last known connection state, without doing any I/O
    fn maybe_connected(&self) -> Option<bool>;

    /// Check the connection, refreshing the cached state
    async fn is_connected(&self) -> Result<bool, IntegrationError>;

    /// Establish a connection. `source` tags where the request came from.
    async fn connect(&self, source: &str) -> Result<bool, IntegrationError>;

    /// Open issues assigned to the connected user
    async fn get_my_issues(&self) -> Result<Vec<IssueRef>, IntegrationError>;
}

/// Resolve a connection state, preferring the cached value
pub async fn ensure_connected_state(integration: &dyn Integration) -> Result<bool, IntegrationError> {
    match integration.maybe_connected() {
        Some(connected) => Ok(connected),
        None => integration.is_connected().await,
    }
}

#[async_trait]
pub trait IntegrationRegistry: Send + Sync {
    async fn get(&self, id: IntegrationId) -> Result<Arc<dyn Integration>, IntegrationError>;

    /// Connect every listed integration that isn't connected yet.
    /// Returns whether at least one of them ends up connected.
    async fn connect_cloud_integrations(&self, ids: &[IntegrationId], source: &str) -> bool;

    /// Issues across the listed integrations. `None` when none could be queried.
    async fn get_my_issues(&self, ids: &[IntegrationId]) -> Option<Vec<IssueRef>>;
}

/// Registry of the integrations this process knows about
#[derive(Default)]
pub struct Integrations {
    integrations: HashMap<IntegrationId, Arc<dyn Integration>>,
}

impl Integrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        debug!(integration = %integration.id(), "Registering integration");
        self.integrations.insert(integration.id(), integration);
    }

    pub fn with(mut self, integration: Arc<dyn Integration>) -> Self {
        self.register(integration);
        self
    }

    /// Build the registry from configuration
    pub fn from_config(config: &Config) -> Self {
        let mut integrations = Self::new();
        if config.integrations.github.enabled {
            integrations.register(Arc::new(GitHubIntegration::from_config(
                &config.integrations.github,
            )));
        }
        integrations
    }

    pub fn ids(&self) -> Vec<IntegrationId> {
        let mut ids: Vec<_> = self.integrations.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl IntegrationRegistry for Integrations {
    async fn get(&self, id: IntegrationId) -> Result<Arc<dyn Integration>, IntegrationError> {
        self.integrations
            .get(&id)
            .cloned()
            .ok_or(IntegrationError::NotRegistered(id))
    }

    async fn connect_cloud_integrations(&self, ids: &[IntegrationId], source: &str) -> bool {
        let mut any_connected = false;

        // One at a time: each connect may run an interactive login
        for id in ids {
            let Some(integration) = self.integrations.get(id) else {
                continue;
            };

            let connected = match ensure_connected_state(integration.as_ref()).await {
                Ok(true) => Ok(true),
                _ => integration.connect(source).await,
            };

            match connected {
                Ok(connected) => {
                    info!(integration = %id, connected, source, "Connect attempt finished");
                    any_connected |= connected;
                }
                Err(e) => warn!(integration = %id, error = %e, "Failed to connect integration"),
            }
        }

        any_connected
    }

    async fn get_my_issues(&self, ids: &[IntegrationId]) -> Option<Vec<IssueRef>> {
        let queries = ids
            .iter()
            .filter_map(|id| self.integrations.get(id).cloned())
            .map(|integration| async move { (integration.id(), integration.get_my_issues().await) });

        let mut issues = Vec::new();
        let mut queried = false;
        for (id, result) in join_all(queries).await {
            match result {
                Ok(mut found) => {
                    debug!(integration = %id, count = found.len(), "Fetched issues");
                    queried = true;
                    issues.append(&mut found);
                }
                Err(e) => warn!(integration = %id, error = %e, "Failed to fetch issues"),
            }
        }

        queried.then_some(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str) -> IssueRef {
        MockIntegration::issue(IntegrationId::GitHub, id, "Title")
    }

    #[tokio::test]
    async fn test_get_unregistered() {
        let registry = Integrations::new();
        let result = registry.get(IntegrationId::Jira).await;
        assert!(matches!(
            result,
            Err(IntegrationError::NotRegistered(IntegrationId::Jira))
        ));
    }

    #[tokio::test]
    async fn test_get_my_issues_merges_and_skips_failures() {
        let github = MockIntegration::connected(IntegrationId::GitHub).with_issues(vec![issue("1")]);
        let linear = MockIntegration::connected(IntegrationId::Linear);
        linear.fail_fetch("boom");
        let registry = Integrations::new()
            .with(Arc::new(github))
            .with(Arc::new(linear));

        let issues = registry
            .get_my_issues(&[IntegrationId::GitHub, IntegrationId::Linear])
            .await
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "1");
    }

    #[tokio::test]
    async fn test_get_my_issues_none_when_all_fail() {
        let github = MockIntegration::connected(IntegrationId::GitHub);
        github.fail_fetch("down");
        let registry = Integrations::new().with(Arc::new(github));

        assert!(registry.get_my_issues(&[IntegrationId::GitHub]).await.is_none());
        assert!(registry.get_my_issues(&[IntegrationId::Jira]).await.is_none());
    }

    #[tokio::test]
    async fn test_connect_cloud_integrations() {
        let github = Arc::new(MockIntegration::disconnected(IntegrationId::GitHub).connects_to(true));
        let registry = Integrations::new().with(github.clone());

        assert!(
            registry
                .connect_cloud_integrations(&[IntegrationId::GitHub], "test")
                .await
        );
        assert_eq!(github.connect_sources(), vec!["test".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_cloud_skips_connected() {
        let github = Arc::new(MockIntegration::connected(IntegrationId::GitHub));
        let registry = Integrations::new().with(github.clone());

        assert!(
            registry
                .connect_cloud_integrations(&[IntegrationId::GitHub], "test")
                .await
        );
        assert!(github.connect_sources().is_empty());
    }

    #[test]
    fn test_integration_id_display_and_name() {
        assert_eq!(IntegrationId::GitHub.to_string(), "github");
        assert_eq!(IntegrationId::GitHub.name(), "GitHub");
        assert_eq!(
            serde_json::to_string(&IntegrationId::Linear).unwrap(),
            "\"linear\""
        );
    }
}
