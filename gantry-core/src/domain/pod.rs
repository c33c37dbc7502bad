//! Runner pod domain model
//!
//! The pod that backs a runner. Progress of the graceful stop protocol is
//! recorded on the pod itself through a small set of annotations, each written
//! at most once for the pod's lifetime.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registry-assigned runner identifier, set once the runner shows up in the registry
pub const ANNOTATION_RUNNER_ID: &str = "actions-runner/id";

/// RFC3339 instant marking the start of the unregistration grace window
pub const ANNOTATION_UNREGISTRATION_START: &str = "actions-runner/unregistration-start-timestamp";

/// RFC3339 instant recorded once the runner is known to be unregistered
pub const ANNOTATION_UNREGISTRATION_COMPLETE: &str =
    "actions-runner/unregistration-complete-timestamp";

/// Name of the container running the runner agent inside the pod
pub const RUNNER_CONTAINER_NAME: &str = "runner";

/// A pod backing a single runner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerPod {
    /// Namespace the pod lives in
    pub namespace: String,

    /// Pod name
    pub name: String,

    /// Version of the object as last observed; used for conditional patches
    pub resource_version: Option<String>,

    /// Pod annotations
    pub annotations: BTreeMap<String, String>,

    /// Lifecycle phase reported by the cluster
    pub phase: PodPhase,

    /// Status of each container in the pod
    pub container_statuses: Vec<ContainerStatus>,

    /// Pod conditions
    pub conditions: Vec<PodCondition>,
}

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Status of one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub state: ContainerState,
}

/// Container state, reduced to what the controller needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContainerState {
    Waiting,
    Running,
    Terminated { exit_code: i32 },
}

/// A single pod condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodCondition {
    /// Condition type, e.g. "Ready"
    pub condition_type: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    pub last_transition_time: Option<DateTime<Utc>>,
}

impl RunnerPod {
    /// Creates a pending pod with no annotations
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Namespace-qualified name, for logging
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Returns the value of an annotation if present
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }

    /// Returns the registry runner id recorded on the pod, unparsed
    pub fn runner_id_annotation(&self) -> Option<&str> {
        self.annotation(ANNOTATION_RUNNER_ID)
    }

    /// Exit code of the runner container, if it has terminated
    pub fn runner_container_exit_code(&self) -> Option<i32> {
        self.container_statuses
            .iter()
            .filter(|status| status.name == RUNNER_CONTAINER_NAME)
            .find_map(|status| match status.state {
                ContainerState::Terminated { exit_code } => Some(exit_code),
                _ => None,
            })
    }

    /// Whether the pod or its runner container has stopped
    ///
    /// A pod that has reached `Succeeded` or `Failed` is stopped. A running pod
    /// counts as stopped once the runner container exited with code 0, which is
    /// what an ephemeral runner does after deregistering itself.
    pub fn is_runner_stopped(&self) -> bool {
        match self.phase {
            PodPhase::Succeeded | PodPhase::Failed => true,
            PodPhase::Running => self.runner_container_exit_code() == Some(0),
            PodPhase::Pending | PodPhase::Unknown => false,
        }
    }

    /// When the given condition last transitioned to `status`
    pub fn condition_transition_time(
        &self,
        condition_type: &str,
        status: &str,
    ) -> Option<DateTime<Utc>> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type && c.status == status)
            .and_then(|c| c.last_transition_time)
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}
