//! GitHub REST client for the issues assigned to the authenticated user

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::error::ApiError;
use crate::integrations::{IntegrationId, IssueAuthor, IssueRef, IssueRepository};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const PROVIDER_NAME: &str = "github";
const PAGE_SIZE: u32 = 50;

/// GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

// Response types for API deserialization
#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    title: String,
    body: Option<String>,
    html_url: String,
    updated_at: DateTime<Utc>,
    user: UserResponse,
    repository_url: String,
    repository: Option<RepositoryResponse>,
    /// Present when the "issue" is actually a pull request
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    name: String,
    owner: UserResponse,
}

impl GitHubClient {
    pub fn new(token: String, api_base: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("startwork/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_base, path))
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Open issues assigned to the authenticated user, across all repositories
    pub async fn get_my_issues(&self) -> Result<Vec<IssueRef>, ApiError> {
        let path = format!("/issues?filter=assigned&state=open&per_page={PAGE_SIZE}");
        debug!(%path, "Fetching assigned issues");

        let response = self
            .get(&path)
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(PROVIDER_NAME, status.as_u16(), body));
        }

        let issues: Vec<IssueResponse> = response
            .json()
            .await
            .map_err(|e| ApiError::parse(PROVIDER_NAME, e.to_string()))?;

        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(into_issue_ref)
            .collect())
    }

    /// Test connectivity by fetching the authenticated user
    pub async fn test_connection(&self) -> Result<bool, ApiError> {
        let response = self
            .get("/user")
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => Ok(true),
            401 | 403 => Ok(false),
            status => Err(ApiError::from_status(PROVIDER_NAME, status, "")),
        }
    }

    /// Parse owner and repo from a "owner/repo" string
    pub fn parse_repo(github_repo: &str) -> Option<(&str, &str)> {
        let parts: Vec<&str> = github_repo.split('/').collect();
        if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
            Some((parts[0], parts[1]))
        } else {
            None
        }
    }
}

/// `https://api.github.com/repos/acme/app` -> ("acme", "app")
fn repo_from_url(repository_url: &str) -> Option<(&str, &str)> {
    let (_, tail) = repository_url.split_once("/repos/")?;
    GitHubClient::parse_repo(tail.trim_end_matches('/'))
}

fn into_issue_ref(issue: IssueResponse) -> IssueRef {
    let repository = match &issue.repository {
        Some(repo) => Some(IssueRepository {
            owner: repo.owner.login.clone(),
            repo: repo.name.clone(),
        }),
        None => repo_from_url(&issue.repository_url).map(|(owner, repo)| IssueRepository {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }),
    };

    IssueRef {
        provider: IntegrationId::GitHub,
        id: issue.number.to_string(),
        title: issue.title,
        body: issue.body,
        url: issue.html_url,
        repository,
        author: IssueAuthor {
            name: issue.user.login,
            avatar_url: issue.user.avatar_url,
        },
        updated_date: issue.updated_at,
    }
}
