//! Which supported integrations are connected right now

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::integrations::{ensure_connected_state, IntegrationId, IntegrationRegistry};

/// Integrations the flow can pull issues from
pub const SUPPORTED_START_WORK_INTEGRATIONS: &[IntegrationId] = &[IntegrationId::GitHub];

/// Connection state per supported integration
pub type ConnectedIntegrations = BTreeMap<IntegrationId, bool>;

pub struct StartWorkProvider {
    registry: Arc<dyn IntegrationRegistry>,
}

impl StartWorkProvider {
    pub fn new(registry: Arc<dyn IntegrationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn IntegrationRegistry> {
        &self.registry
    }

    /// Check every supported integration concurrently. Cached states are
    /// used as-is; a failed check is recorded as not connected.
    pub async fn get_connected_integrations(&self) -> ConnectedIntegrations {
        let checks = SUPPORTED_START_WORK_INTEGRATIONS.iter().map(|&id| async move {
            let integration = self.registry.get(id).await?;
            let connected = ensure_connected_state(integration.as_ref()).await?;
            Ok::<_, crate::integrations::IntegrationError>((id, connected))
        });

        let mut connected = ConnectedIntegrations::new();
        for (id, result) in SUPPORTED_START_WORK_INTEGRATIONS
            .iter()
            .zip(join_all(checks).await)
        {
            match result {
                Ok((id, state)) => {
                    connected.insert(id, state);
                }
                Err(e) => {
                    warn!(integration = %id, error = %e, "Connection check failed");
                    connected.insert(*id, false);
                }
            }
        }

        debug!(?connected, "Connected integrations");
        connected
    }
}

/// Whether any integration in the map is connected
pub fn has_connected(connected: &ConnectedIntegrations) -> bool {
    connected.values().any(|&c| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{Integrations, MockIntegration};

    #[tokio::test]
    async fn test_reports_connected_state() {
        let registry = Integrations::new().with(Arc::new(MockIntegration::connected(IntegrationId::GitHub)));
        let provider = StartWorkProvider::new(Arc::new(registry));

        let connected = provider.get_connected_integrations().await;
        assert_eq!(connected.get(&IntegrationId::GitHub), Some(&true));
        assert!(has_connected(&connected));
    }

    #[tokio::test]
    async fn test_prefers_cached_state() {
        let github = MockIntegration::connected(IntegrationId::GitHub);
        *github.cached.lock().unwrap() = Some(false);
        let provider = StartWorkProvider::new(Arc::new(Integrations::new().with(Arc::new(github))));

        let connected = provider.get_connected_integrations().await;
        assert_eq!(connected.get(&IntegrationId::GitHub), Some(&false));
        assert!(!has_connected(&connected));
    }

    #[tokio::test]
    async fn test_failed_check_is_not_connected() {
        let github = MockIntegration::connected(IntegrationId::GitHub);
        github.fail_check("offline");
        let provider = StartWorkProvider::new(Arc::new(Integrations::new().with(Arc::new(github))));

        let connected = provider.get_connected_integrations().await;
        assert_eq!(connected.get(&IntegrationId::GitHub), Some(&false));
        assert!(!has_connected(&connected));
    }

    #[tokio::test]
    async fn test_unregistered_is_not_connected() {
        let provider = StartWorkProvider::new(Arc::new(Integrations::new()));
        let connected = provider.get_connected_integrations().await;
        assert_eq!(connected.get(&IntegrationId::GitHub), Some(&false));
    }
}
