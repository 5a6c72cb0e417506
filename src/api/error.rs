//! API error types for tracker integrations

use thiserror::Error;

/// Errors that can occur when talking to an issue tracker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401 Unauthorized - token invalid or expired
    #[error("{provider}: Unauthorized (401)")]
    Unauthorized { provider: String },

    /// 403 Forbidden - token lacks required permissions
    #[error("{provider}: Forbidden (403) - insufficient permissions")]
    Forbidden { provider: String },

    /// 429 Rate Limited
    #[error("{provider}: Rate limited")]
    RateLimited { provider: String },

    /// Network or timeout error
    #[error("{provider}: Network error - {message}")]
    NetworkError { provider: String, message: String },

    /// Other HTTP errors
    #[error("{provider}: HTTP {status} - {message}")]
    HttpError {
        provider: String,
        status: u16,
        message: String,
    },

    /// Response body didn't match the expected shape
    #[error("{provider}: Parse error - {message}")]
    ParseError { provider: String, message: String },

    /// Provider not configured (no token available)
    #[error("{provider}: Not configured (no API token)")]
    NotConfigured { provider: String },
}

impl ApiError {
    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    pub fn provider_name(&self) -> &str {
        match self {
            ApiError::Unauthorized { provider }
            | ApiError::Forbidden { provider }
            | ApiError::RateLimited { provider }
            | ApiError::NetworkError { provider, .. }
            | ApiError::HttpError { provider, .. }
            | ApiError::ParseError { provider, .. }
            | ApiError::NotConfigured { provider } => provider,
        }
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let provider = provider.into();
        match status {
            401 => ApiError::Unauthorized { provider },
            403 => ApiError::Forbidden { provider },
            429 => ApiError::RateLimited { provider },
            _ => ApiError::HttpError {
                provider,
                status,
                message: body.into(),
            },
        }
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ParseError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn not_configured(provider: impl Into<String>) -> Self {
        ApiError::NotConfigured {
            provider: provider.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(
            ApiError::from_status("github", 401, ""),
            ApiError::Unauthorized {
                provider: "github".to_string()
            }
        );
        assert!(ApiError::from_status("github", 403, "").is_auth_error());
        assert!(matches!(
            ApiError::from_status("github", 429, ""),
            ApiError::RateLimited { .. }
        ));
        assert!(matches!(
            ApiError::from_status("github", 502, "bad gateway"),
            ApiError::HttpError { status: 502, .. }
        ));
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(ApiError::network("github", "timeout").provider_name(), "github");
        assert_eq!(ApiError::not_configured("jira").provider_name(), "jira");
    }

    #[test]
    fn test_display() {
        let err = ApiError::not_configured("github");
        assert_eq!(err.to_string(), "github: Not configured (no API token)");

        let err = ApiError::from_status("github", 500, "boom");
        assert_eq!(err.to_string(), "github: HTTP 500 - boom");
    }
}
