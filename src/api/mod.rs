//! API clients for external trackers
//!
//! - `github`: REST client for assigned issues
//! - `gh_cli`: `gh` wrapper used to connect GitHub
//! - `error`: shared API error type

pub mod error;
pub mod gh_cli;
pub mod github;

pub use error::ApiError;
pub use gh_cli::GhCli;
pub use github::GitHubClient;
