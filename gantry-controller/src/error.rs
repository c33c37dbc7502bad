//! Error types for the controller
//!
//! Registry failures come from `gantry-client`; pod store failures and
//! annotation decoding failures are defined here.

use std::num::ParseIntError;

use gantry_client::RegistryError;
use thiserror::Error;

/// Errors returned by a [`PodStore`](crate::annotator::PodStore)
#[derive(Debug, Error)]
pub enum PodStoreError {
    /// The pod changed since it was read; the patch was rejected
    #[error("pod {0} was modified concurrently")]
    Conflict(String),

    #[error("pod {0} not found")]
    NotFound(String),

    /// Cluster API rejected the request
    #[error("cluster API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request failed
    #[error("cluster request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse pod: {0}")]
    Parse(String),
}

impl PodStoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Errors surfaced by a graceful stop or registration tick
#[derive(Debug, Error)]
pub enum GracefulStopError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    PodStore(#[from] PodStoreError),

    /// The runner id annotation is not an integer
    #[error("invalid runner id annotation {value:?}: {source}")]
    InvalidRunnerId {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// A timestamp annotation is not RFC3339
    #[error("invalid timestamp in annotation {key} ({value:?}): {source}")]
    InvalidTimestamp {
        key: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl GracefulStopError {
    /// Whether the error is a rejected conditional patch
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PodStore(err) if err.is_conflict())
    }
}
