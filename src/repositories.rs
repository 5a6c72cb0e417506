//! Repository discovery and the barrier flows wait on before starting.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::git::GitCli;

#[derive(Debug, Clone, Default)]
struct DiscoveryState {
    discovering: bool,
    repositories: Vec<PathBuf>,
}

/// Known repositories plus a "discovery still running" barrier
pub struct RepositoryDiscovery {
    state: watch::Sender<DiscoveryState>,
}

impl Default for RepositoryDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryDiscovery {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DiscoveryState::default());
        Self { state }
    }

    /// Already-discovered repositories, no barrier
    pub fn with_repositories(repositories: Vec<PathBuf>) -> Self {
        let discovery = Self::new();
        discovery.finish(repositories);
        discovery
    }

    pub fn start(&self) {
        self.state.send_modify(|s| s.discovering = true);
    }

    pub fn finish(&self, repositories: Vec<PathBuf>) {
        debug!(count = repositories.len(), "Repository discovery finished");
        self.state.send_modify(|s| {
            s.discovering = false;
            s.repositories = repositories;
        });
    }

    pub fn is_discovering(&self) -> bool {
        self.state.borrow().discovering
    }

    pub fn repositories(&self) -> Vec<PathBuf> {
        self.state.borrow().repositories.clone()
    }

    /// Resolves once discovery is not running
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in self, so the channel can't close while we wait
        let _ = rx.wait_for(|s| !s.discovering).await;
    }

    /// Resolve `candidates` to repository roots in the background
    pub fn spawn(self: &Arc<Self>, candidates: Vec<PathBuf>) -> tokio::task::JoinHandle<()> {
        self.start();
        let discovery = Arc::clone(self);
        tokio::spawn(async move {
            let repositories = discover(candidates).await;
            discovery.finish(repositories);
        })
    }
}

/// Repository roots for each candidate path, deduplicated in order
pub async fn discover(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        match GitCli::repo_root(&candidate).await {
            Ok(root) => {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
            Err(e) => warn!(path = %candidate.display(), error = %e, "Not a git repository"),
        }
    }
    info!(count = roots.len(), "Discovered repositories");
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_idle() {
        let discovery = RepositoryDiscovery::new();
        assert!(!discovery.is_discovering());
        tokio::time::timeout(Duration::from_secs(1), discovery.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_blocks_until_finish() {
        let discovery = Arc::new(RepositoryDiscovery::new());
        discovery.start();
        assert!(discovery.is_discovering());

        let waiter = {
            let discovery = Arc::clone(&discovery);
            tokio::spawn(async move {
                discovery.wait().await;
                discovery.repositories()
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        discovery.finish(vec![PathBuf::from("/work/app")]);
        let repositories = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(repositories, vec![PathBuf::from("/work/app")]);
    }

    #[tokio::test]
    async fn test_discover_skips_non_repositories() {
        let dir = tempfile::TempDir::new().unwrap();
        // A bare temp dir is not inside any repository
        let roots = discover(vec![dir.path().to_path_buf()]).await;
        assert!(roots.iter().all(|r| r != dir.path()));
    }
}
