//! Gantry Registry Client
//!
//! Client for the job-dispatch service's runner directory.
//!
//! The [`RegistryClient`] trait is the seam the controller depends on; the
//! [`HttpRegistryClient`] implements it against the registry's REST API and
//! classifies every failed response into a [`RegistryError`] variant.
//!
//! # Example
//!
//! ```no_run
//! use gantry_client::{HttpRegistryClient, RegistryClient};
//! use gantry_core::domain::scope::RunnerScope;
//!
//! # async fn example() -> gantry_client::Result<()> {
//! let client = HttpRegistryClient::new("https://api.github.com").with_token("ghp_example");
//! let scope = RunnerScope::organization("acme");
//!
//! if let Some(runner) = client.find_runner(&scope, "runner-abc").await? {
//!     println!("runner {:?} is {}", runner.id, runner.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod runners;

pub use error::{RegistryError, Result};

use async_trait::async_trait;
use gantry_core::domain::runner::RegistryRunner;
use gantry_core::domain::scope::{RunnerScope, ScopeLevel};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Access to the registry's runner directory
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Lists every runner registered under the scope
    async fn list_runners(&self, scope: &RunnerScope) -> Result<Vec<RegistryRunner>>;

    /// Removes a runner by id
    ///
    /// Removing an id that no longer exists fails with [`RegistryError::NotFound`].
    /// The registry itself refuses to remove a runner that is running a job.
    async fn remove_runner(&self, scope: &RunnerScope, id: i64) -> Result<()>;

    /// Looks up a runner by name
    ///
    /// Returns `Ok(None)` when no runner with that name is registered yet.
    async fn find_runner(&self, scope: &RunnerScope, name: &str) -> Result<Option<RegistryRunner>> {
        let runners = self.list_runners(scope).await?;
        Ok(runners.into_iter().find(|runner| runner.name == name))
    }
}

/// HTTP client for the registry API
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    /// Base URL of the registry API (e.g., "https://api.github.com")
    base_url: String,
    /// Bearer token sent with every request
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl HttpRegistryClient {
    /// Create a new registry client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the registry API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new registry client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the registry
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the runner collection for a scope
    fn runners_url(&self, scope: &RunnerScope) -> Result<String> {
        let prefix = match scope.level() {
            Some(ScopeLevel::Enterprise(e)) => format!("/enterprises/{}", e),
            Some(ScopeLevel::Organization(o)) => format!("/orgs/{}", o),
            Some(ScopeLevel::Repository(r)) => {
                if r.split('/').filter(|part| !part.is_empty()).count() != 2 {
                    return Err(RegistryError::InvalidRequest(format!(
                        "repository must be in owner/name form, got {:?}",
                        r
                    )));
                }
                format!("/repos/{}", r)
            }
            None => {
                return Err(RegistryError::InvalidRequest(
                    "one of enterprise, organization or repository must be set".to_string(),
                ));
            }
        };

        Ok(format!("{}{}/actions/runners", self.base_url, prefix))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "gantry-controller");

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}

async fn error_from_response(response: reqwest::Response) -> RegistryError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    classify_error(status, &headers, body)
}

/// Classifies a failed registry response
///
/// Rate limiting is reported either as 429 or as 403 with an exhausted quota
/// (or a "secondary rate limit" message), so 403 has to be inspected further.
pub fn classify_error(status: StatusCode, headers: &HeaderMap, body: String) -> RegistryError {
    let message = error_message(&body);

    let quota_exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0");
    let mentions_rate_limit = message.to_ascii_lowercase().contains("rate limit");

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (quota_exhausted || mentions_rate_limit))
    {
        return RegistryError::RateLimited {
            message,
            reset_after: rate_limit_reset(headers),
        };
    }

    if status == StatusCode::NOT_FOUND {
        return RegistryError::NotFound(message);
    }

    RegistryError::api_error(status.as_u16(), message)
}

/// Extracts `message` from a JSON error document, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Backoff suggested by `retry-after` (seconds) or `x-ratelimit-reset` (epoch seconds)
fn rate_limit_reset(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = header_str(headers, "retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }

    let reset = header_str(headers, "x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok())?;
    let remaining = reset - chrono::Utc::now().timestamp();
    u64::try_from(remaining).ok().map(Duration::from_secs)
}
