//! Registry runner domain model
//!
//! Represents a runner as known to the job-dispatch service. The controller
//! only reads these entries and asks the registry to remove them.

use serde::{Deserialize, Serialize};

/// A runner entry in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRunner {
    /// Identifier assigned by the registry; absent until registration completes
    pub id: Option<i64>,

    /// Runner name, matching the name of the backing pod's runner
    pub name: String,

    /// Operating system reported by the runner agent
    #[serde(default)]
    pub os: String,

    /// Connection status of the runner
    pub status: RunnerStatus,

    /// Whether the runner is currently executing a job
    #[serde(default)]
    pub busy: bool,

    #[serde(default)]
    pub labels: Vec<RunnerLabel>,
}

/// A label attached to a runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerLabel {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

/// Connection status of a registry runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerStatus {
    /// Runner agent is connected
    Online,

    /// Runner agent is not connected
    Offline,
}

impl std::fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerStatus::Online => write!(f, "online"),
            RunnerStatus::Offline => write!(f, "offline"),
        }
    }
}
