//! Registration tracker
//!
//! Records the registry-assigned runner id on the pod once the runner has
//! registered, so later unregistration can remove it by id.

use std::time::Duration;

use gantry_core::domain::pod::{ANNOTATION_RUNNER_ID, RunnerPod};
use tracing::{debug, info, warn};

use crate::annotator::annotate_once;
use crate::error::GracefulStopError;
use crate::graceful_stop::{REGISTRATION_POLL_DELAY, RunnerController, RunnerTarget};

/// Result of a registration tick
#[derive(Debug)]
pub enum RegistrationOutcome {
    /// Nothing left to track; carries the (possibly annotated) pod
    Registered(RunnerPod),

    /// The runner is not visible yet or the lookup failed; check again after `after`
    Requeue {
        after: Duration,
        cause: Option<GracefulStopError>,
    },
}

impl RunnerController {
    /// Annotates the pod with its runner id once the runner has registered
    ///
    /// Stopped runners and pods that already carry an id are left untouched.
    pub async fn ensure_registered(
        &self,
        runner: &RunnerTarget,
        pod: RunnerPod,
    ) -> RegistrationOutcome {
        if pod.is_runner_stopped() || pod.runner_id_annotation().is_some() {
            return RegistrationOutcome::Registered(pod);
        }

        let found = match self.registry.find_runner(&runner.scope, &runner.name).await {
            Ok(found) => found,
            Err(err) => {
                warn!(runner = %runner.name, error = %err, "Failed to look up runner registration");
                return RegistrationOutcome::Requeue {
                    after: REGISTRATION_POLL_DELAY,
                    cause: Some(err.into()),
                };
            }
        };

        let Some(id) = found.and_then(|r| r.id) else {
            debug!(
                runner = %runner.name,
                ready_since = ?pod.condition_transition_time("Ready", "True"),
                "Runner is not registered yet"
            );
            return RegistrationOutcome::Requeue {
                after: REGISTRATION_POLL_DELAY,
                cause: None,
            };
        };

        match annotate_once(self.pods.as_ref(), pod, ANNOTATION_RUNNER_ID, &id.to_string()).await {
            Ok(pod) => {
                info!(runner = %runner.name, runner_id = id, "Runner registration recorded");
                RegistrationOutcome::Registered(pod)
            }
            Err(err) => RegistrationOutcome::Requeue {
                after: REGISTRATION_POLL_DELAY,
                cause: Some(err.into()),
            },
        }
    }
}
