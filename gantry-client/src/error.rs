//! Error types for the registry client
//!
//! Every failure of a registry call is classified into exactly one variant so
//! that callers can branch on the kind of failure instead of raw status codes.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Status the registry returns when a runner cannot be removed in its current state,
/// e.g. while it is still registering or running a job
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// Errors returned by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry is throttling this client
    #[error("rate limited by registry: {message}")]
    RateLimited {
        message: String,
        /// Backoff suggested by the registry, if it sent one
        reset_after: Option<Duration>,
    },

    /// The runner (or the scope) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Registry rejected the request with a structured error
    #[error("registry API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the registry
        message: String,
    },

    /// The request never produced a response
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("failed to parse registry response: {0}")]
    Parse(String),

    /// Request could not be built, e.g. an empty scope
    #[error("invalid registry request: {0}")]
    InvalidRequest(String),
}

impl RegistryError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Status code of a structured API error
    pub fn api_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the registry refused removal because of the runner's state
    ///
    /// The registry answers 422 both for runners that are still registering and
    /// for runners busy with a job.
    pub fn is_still_registering(&self) -> bool {
        self.api_status() == Some(STATUS_UNPROCESSABLE)
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self.api_status(), Some(status) if (400..500).contains(&status))
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self.api_status(), Some(status) if status >= 500)
    }
}
