//! Graceful stop tick
//!
//! Drives a runner towards a state where its pod can be deleted without losing
//! a job that is running or about to be scheduled on it.
//!
//! A graceful stop spans many ticks. Each tick:
//! 1. records the start of unregistration on the pod (once),
//! 2. asks the registry to remove the runner and decides whether the pod is
//!    safe to delete yet,
//! 3. records completion on the pod (once) and hands the pod back for deletion.
//!
//! Every step is idempotent, so a tick interrupted at any point (controller
//! restart, requeue) resumes from the pod annotations and a fresh registry
//! query. The caller owns scheduling: a tick never sleeps, it only returns how
//! long to wait before the next one.

use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use gantry_client::RegistryClient;
use gantry_core::domain::pod::{
    ANNOTATION_UNREGISTRATION_COMPLETE, ANNOTATION_UNREGISTRATION_START, RunnerPod,
};
use gantry_core::domain::scope::RunnerScope;
use tracing::warn;

use crate::annotator::{PodStore, annotate_once};
use crate::clock::{Clock, SystemClock};
use crate::decider::Decision;
use crate::error::{GracefulStopError, PodStoreError};

/// Default delay between ticks while a runner is being unregistered
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Delay after the registry rate-limited us
pub const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Delay between registry lookups while waiting for a runner to register
pub const REGISTRATION_POLL_DELAY: Duration = Duration::from_secs(10);

/// Default grace period before an unregisterable runner's pod is deleted anyway
pub const DEFAULT_UNREGISTRATION_TIMEOUT: Duration = Duration::from_secs(60);

/// The runner a tick operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerTarget {
    pub scope: RunnerScope,

    /// Runner name in the registry
    pub name: String,
}

impl RunnerTarget {
    pub fn new(scope: RunnerScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

/// Result of one graceful stop tick
#[derive(Debug)]
pub enum TickOutcome {
    /// The runner can no longer receive jobs; the pod may be deleted now
    ///
    /// Carries the pod with its completion annotation, or `None` when there was
    /// no pod to begin with.
    Deletable(Option<RunnerPod>),

    /// Not safe yet; tick again after `after`
    ///
    /// `cause` is set when the wait is due to an error worth reporting.
    Requeue {
        after: Duration,
        cause: Option<GracefulStopError>,
    },

    /// The tick failed; tick again using the caller's own backoff
    Failed(GracefulStopError),
}

impl TickOutcome {
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Deletable(_))
    }

    /// Delay requested before the next tick, if any
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Requeue { after, .. } => Some(*after),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&GracefulStopError> {
        match self {
            Self::Requeue { cause, .. } => cause.as_ref(),
            Self::Failed(err) => Some(err),
            Self::Deletable(_) => None,
        }
    }

    pub(crate) fn from_decision(decision: Decision) -> Option<Self> {
        match decision {
            Decision::Deletable => None,
            Decision::Requeue { after, cause } => Some(Self::Requeue { after, cause }),
            Decision::Failed(err) => Some(Self::Failed(err)),
        }
    }

    /// Rejected conditional patches are transient; other patch failures are not
    fn from_patch_error(err: PodStoreError, retry_delay: Duration) -> Self {
        if err.is_conflict() {
            Self::Requeue {
                after: retry_delay,
                cause: Some(err.into()),
            }
        } else {
            Self::Failed(err.into())
        }
    }
}

/// Runs graceful stop and registration ticks against a registry and a pod store
///
/// Holds no per-runner state; one controller serves any number of runners.
pub struct RunnerController {
    pub(crate) registry: Arc<dyn RegistryClient>,
    pub(crate) pods: Arc<dyn PodStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl RunnerController {
    pub fn new(registry: Arc<dyn RegistryClient>, pods: Arc<dyn PodStore>) -> Self {
        Self::with_clock(registry, pods, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: Arc<dyn RegistryClient>,
        pods: Arc<dyn PodStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            pods,
            clock,
        }
    }

    /// Advances the graceful stop of `runner` by one step
    ///
    /// Issues at most two annotation patches and at most one remove call.
    pub async fn tick_graceful_stop(
        &self,
        runner: &RunnerTarget,
        unregistration_timeout: Duration,
        retry_delay: Duration,
        pod: Option<RunnerPod>,
    ) -> TickOutcome {
        let pod = match pod {
            Some(pod) => match self.mark(pod, ANNOTATION_UNREGISTRATION_START).await {
                Ok(pod) => Some(pod),
                Err(err) => return TickOutcome::from_patch_error(err, retry_delay),
            },
            None => None,
        };

        let decision = self
            .ensure_unregistered(runner, unregistration_timeout, retry_delay, pod.as_ref())
            .await;
        if let Some(outcome) = TickOutcome::from_decision(decision) {
            return outcome;
        }

        let pod = match pod {
            Some(pod) => match self.mark(pod, ANNOTATION_UNREGISTRATION_COMPLETE).await {
                Ok(pod) => Some(pod),
                Err(err) => {
                    warn!(runner = %runner.name, error = %err, "Failed to mark unregistration complete");
                    return TickOutcome::from_patch_error(err, retry_delay);
                }
            },
            None => None,
        };

        TickOutcome::Deletable(pod)
    }

    /// Writes the current time under `key` unless already present
    async fn mark(&self, pod: RunnerPod, key: &str) -> Result<RunnerPod, PodStoreError> {
        let now = self
            .clock
            .now()
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        annotate_once(self.pods.as_ref(), pod, key, &now).await
    }
}
