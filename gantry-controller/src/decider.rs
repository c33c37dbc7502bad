//! Unregistration decider
//!
//! Removes the runner from the registry and turns the outcome, together with
//! the durable state recorded on the pod, into a single decision.
//!
//! The registry cannot tell apart a runner that was already removed, one that
//! will never register (e.g. a broken registration token) and one that is
//! about to register. All three look like "not found". The pod annotations
//! disambiguate: a completion mark means it was removed earlier, and the start
//! mark bounds how long we wait for a runner that may still show up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gantry_client::RegistryError;
use gantry_core::domain::pod::{
    ANNOTATION_UNREGISTRATION_COMPLETE, ANNOTATION_UNREGISTRATION_START, RunnerPod,
};
use tracing::{debug, error, info, warn};

use crate::error::GracefulStopError;
use crate::graceful_stop::{RATE_LIMIT_RETRY_DELAY, RunnerController, RunnerTarget};

/// Whether a runner's pod can be deleted yet
#[derive(Debug)]
pub enum Decision {
    /// The runner can no longer be assigned a job
    Deletable,

    /// Check again after `after`; `cause` is reported but not fatal
    Requeue {
        after: Duration,
        cause: Option<GracefulStopError>,
    },

    /// Unexpected failure; the caller applies its own backoff
    Failed(GracefulStopError),
}

impl RunnerController {
    /// Removes the runner from the registry if needed and decides whether its
    /// pod can be deleted
    ///
    /// `pod` is `None` when the runner's pod was never created.
    pub async fn ensure_unregistered(
        &self,
        runner: &RunnerTarget,
        unregistration_timeout: Duration,
        retry_delay: Duration,
        pod: Option<&RunnerPod>,
    ) -> Decision {
        // Removal was confirmed on an earlier tick; the registry has nothing to add
        if let Some(pod) = pod.filter(|p| is_set(p, ANNOTATION_UNREGISTRATION_COMPLETE)) {
            info!(pod = %pod.qualified_name(), "Runner pod is marked as already unregistered");
            return Decision::Deletable;
        }

        let runner_id = match pod.and_then(|p| p.runner_id_annotation()) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(source) => {
                    return Decision::Failed(GracefulStopError::InvalidRunnerId {
                        value: raw.to_string(),
                        source,
                    });
                }
            },
            None => None,
        };

        match self.unregister_runner(runner, runner_id).await {
            Ok(true) => {
                info!(runner = %runner.name, "Runner has just been unregistered");
                Decision::Deletable
            }
            Ok(false) => self.decide_runner_not_found(unregistration_timeout, retry_delay, pod),
            Err(err) => self.decide_unregistration_failure(runner, pod, err).await,
        }
    }

    /// Removes the runner from the registry
    ///
    /// Returns `Ok(true)` if this call removed it and `Ok(false)` if the
    /// registry does not know the runner: it was already removed, will never
    /// register, or has not registered yet.
    ///
    /// No busy check is made here. The registry refuses to remove a runner
    /// that is running a job, which is the guarantee a graceful stop needs.
    async fn unregister_runner(
        &self,
        runner: &RunnerTarget,
        runner_id: Option<i64>,
    ) -> Result<bool, RegistryError> {
        let id = match runner_id {
            Some(id) => id,
            None => match self.registry.find_runner(&runner.scope, &runner.name).await? {
                Some(found) => match found.id {
                    Some(id) => id,
                    None => return Ok(false),
                },
                None => return Ok(false),
            },
        };

        match self.registry.remove_runner(&runner.scope, id).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn decide_unregistration_failure(
        &self,
        runner: &RunnerTarget,
        pod: Option<&RunnerPod>,
        err: RegistryError,
    ) -> Decision {
        if err.is_rate_limited() {
            error!(
                runner = %runner.name,
                error = %err,
                retry_after = ?RATE_LIMIT_RETRY_DELAY,
                "Failed to unregister runner due to registry rate limits, delaying retry"
            );
            return Decision::Requeue {
                after: RATE_LIMIT_RETRY_DELAY,
                cause: Some(err.into()),
            };
        }

        warn!(runner = %runner.name, error = %err, "Failed to unregister runner before deleting the pod");

        // The runner container is gone, so the runner cannot come back on its own
        // and retrying would never converge.
        if err.is_still_registering() {
            if let Some(exit_code) = pod.and_then(RunnerPod::runner_container_exit_code) {
                let runner_id = match self.registry.find_runner(&runner.scope, &runner.name).await {
                    Ok(found) => found.and_then(|r| r.id),
                    Err(_) => None,
                };

                info!(
                    runner = %runner.name,
                    exit_code,
                    runner_id = ?runner_id,
                    "Runner container has already stopped but the unregistration attempt failed. \
                     The pod will be deleted anyway; the runner may need to be removed from the registry manually"
                );
                return Decision::Deletable;
            }
        }

        Decision::Failed(err.into())
    }

    fn decide_runner_not_found(
        &self,
        unregistration_timeout: Duration,
        retry_delay: Duration,
        pod: Option<&RunnerPod>,
    ) -> Decision {
        let Some(pod) = pod else {
            info!("Runner was not found in the registry and has no pod");
            return Decision::Deletable;
        };

        let pod_name = pod.qualified_name();

        if pod.is_runner_stopped() {
            // An ephemeral runner removes itself from the registry when it exits
            info!(pod = %pod_name, "Runner pod has been stopped with a successful status");
            return Decision::Deletable;
        }

        if let Some(raw) = pod
            .annotation(ANNOTATION_UNREGISTRATION_START)
            .filter(|v| !v.is_empty())
        {
            let started = match DateTime::parse_from_rfc3339(raw) {
                Ok(t) => t.with_timezone(&Utc),
                Err(source) => {
                    return Decision::Failed(GracefulStopError::InvalidTimestamp {
                        key: ANNOTATION_UNREGISTRATION_START,
                        value: raw.to_string(),
                        source,
                    });
                }
            };

            // A start time in the future (clock skew) counts as just started
            let elapsed = (self.clock.now() - started)
                .to_std()
                .unwrap_or(Duration::ZERO);

            if elapsed < unregistration_timeout {
                info!(
                    pod = %pod_name,
                    timeout = ?unregistration_timeout,
                    remaining = ?(unregistration_timeout - elapsed),
                    "Runner unregistration is in progress"
                );
                return Decision::Requeue {
                    after: retry_delay,
                    cause: None,
                };
            }

            info!(
                pod = %pod_name,
                timeout = ?unregistration_timeout,
                "Runner unregistration has timed out. The runner pod will be deleted soon"
            );
            return Decision::Deletable;
        }

        // Pods written by this controller always match one of the branches above;
        // anything else is retried until the caller annotates it.
        debug!(pod = %pod_name, "Runner unregistration is being retried later");
        Decision::Requeue {
            after: retry_delay,
            cause: None,
        }
    }
}

fn is_set(pod: &RunnerPod, key: &str) -> bool {
    pod.annotation(key).is_some_and(|v| !v.is_empty())
}
