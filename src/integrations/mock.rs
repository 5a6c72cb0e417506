//! Scriptable integration for tests and offline runs

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::{
    Integration, IntegrationError, IntegrationId, IssueAuthor, IssueRef, IssueRepository,
};

/// Mock integration with shared, inspectable state
#[derive(Clone)]
pub struct MockIntegration {
    id: IntegrationId,
    /// Cached state reported by `maybe_connected`
    pub cached: Arc<Mutex<Option<bool>>>,
    /// State reported by `is_connected`
    pub connected: Arc<Mutex<bool>>,
    /// State after a `connect` call
    pub connect_result: Arc<Mutex<bool>>,
    pub issues: Arc<Mutex<Vec<IssueRef>>>,
    pub fetch_error: Arc<Mutex<Option<String>>>,
    pub check_error: Arc<Mutex<Option<String>>>,
    pub connect_calls: Arc<Mutex<Vec<String>>>,
    pub fetch_count: Arc<Mutex<usize>>,
}

impl MockIntegration {
    fn with_state(id: IntegrationId, connected: bool) -> Self {
        Self {
            id,
            cached: Arc::new(Mutex::new(None)),
            connected: Arc::new(Mutex::new(connected)),
            connect_result: Arc::new(Mutex::new(connected)),
            issues: Arc::new(Mutex::new(Vec::new())),
            fetch_error: Arc::new(Mutex::new(None)),
            check_error: Arc::new(Mutex::new(None)),
            connect_calls: Arc::new(Mutex::new(Vec::new())),
            fetch_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn connected(id: IntegrationId) -> Self {
        Self::with_state(id, true)
    }

    pub fn disconnected(id: IntegrationId) -> Self {
        Self::with_state(id, false)
    }

    /// Whether a later `connect` call succeeds
    pub fn connects_to(self, result: bool) -> Self {
        *self.connect_result.lock().unwrap() = result;
        self
    }

    pub fn with_issues(self, issues: Vec<IssueRef>) -> Self {
        *self.issues.lock().unwrap() = issues;
        self
    }

    pub fn set_issues(&self, issues: Vec<IssueRef>) {
        *self.issues.lock().unwrap() = issues;
    }

    pub fn fail_fetch(&self, message: &str) {
        *self.fetch_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_check(&self, message: &str) {
        *self.check_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn connect_sources(&self) -> Vec<String> {
        self.connect_calls.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }

    /// An issue in `acme/app` by `octocat`, updated at a fixed time
    pub fn issue(provider: IntegrationId, id: &str, title: &str) -> IssueRef {
        IssueRef {
            provider,
            id: id.to_string(),
            title: title.to_string(),
            body: None,
            url: format!("https://github.com/acme/app/issues/{id}"),
            repository: Some(IssueRepository {
                owner: "acme".to_string(),
                repo: "app".to_string(),
            }),
            author: IssueAuthor {
                name: "octocat".to_string(),
                avatar_url: Some("https://avatars.githubusercontent.com/u/583231".to_string()),
            },
            updated_date: Utc
                .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Integration for MockIntegration {
    fn id(&self) -> IntegrationId {
        self.id
    }

    fn maybe_connected(&self) -> Option<bool> {
        *self.cached.lock().unwrap()
    }

    async fn is_connected(&self) -> Result<bool, IntegrationError> {
        if let Some(message) = self.check_error.lock().unwrap().clone() {
            return Err(anyhow::anyhow!(message).into());
        }
        let connected = *self.connected.lock().unwrap();
        *self.cached.lock().unwrap() = Some(connected);
        Ok(connected)
    }

    async fn connect(&self, source: &str) -> Result<bool, IntegrationError> {
        self.connect_calls.lock().unwrap().push(source.to_string());
        let result = *self.connect_result.lock().unwrap();
        *self.connected.lock().unwrap() = result;
        *self.cached.lock().unwrap() = Some(result);
        Ok(result)
    }

    async fn get_my_issues(&self) -> Result<Vec<IssueRef>, IntegrationError> {
        *self.fetch_count.lock().unwrap() += 1;
        if let Some(message) = self.fetch_error.lock().unwrap().clone() {
            return Err(anyhow::anyhow!(message).into());
        }
        Ok(self.issues.lock().unwrap().clone())
    }
}
