//! Drain loop
//!
//! Repeats graceful stop ticks for one runner until its pod has been deleted.

use anyhow::Result;
use tracing::{error, info, warn};

use crate::annotator::PodStore;
use crate::config::Config;
use crate::error::PodStoreError;
use crate::graceful_stop::{RunnerController, RunnerTarget, TickOutcome};
use crate::registration::RegistrationOutcome;

/// Ticks the graceful stop until the pod can be deleted, then deletes it
///
/// Cluster and registry failures are retried after the configured delay; only
/// configuration problems stop the process.
pub async fn drain(
    controller: &RunnerController,
    pods: &dyn PodStore,
    runner: &RunnerTarget,
    config: &Config,
) -> Result<()> {
    record_registration(controller, pods, runner, config).await;

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let pod = match pods.get_pod(&config.pod_namespace, &config.pod_name).await {
            Ok(pod) => pod,
            Err(e) => {
                warn!(
                    "Failed to fetch runner pod (attempt {}): {}. Retrying in {:?}",
                    attempt, e, config.retry_delay
                );
                tokio::time::sleep(config.retry_delay).await;
                continue;
            }
        };

        let outcome = controller
            .tick_graceful_stop(runner, config.unregistration_timeout, config.retry_delay, pod)
            .await;

        let delay = match outcome {
            TickOutcome::Deletable(Some(pod)) => match pods.delete_pod(&pod).await {
                Ok(()) | Err(PodStoreError::NotFound(_)) => {
                    info!("Runner {} stopped gracefully", runner.name);
                    return Ok(());
                }
                Err(e) => {
                    // The completion mark is on the pod, so the next tick
                    // returns straight to this point.
                    warn!("Failed to delete runner pod (attempt {}): {}", attempt, e);
                    config.retry_delay
                }
            },
            TickOutcome::Deletable(None) => {
                info!("Runner {} has no pod; nothing to delete", runner.name);
                return Ok(());
            }
            TickOutcome::Requeue { after, cause } => {
                if let Some(err) = cause {
                    warn!("Graceful stop postponed: {}", err);
                }
                after
            }
            TickOutcome::Failed(err) => {
                error!("Graceful stop tick failed: {:#}", anyhow::Error::from(err));
                config.retry_delay
            }
        };

        tokio::time::sleep(delay).await;
    }
}

/// Records the runner id on the pod if it is already known
///
/// Unregistration falls back to a lookup by name, so neither an unregistered
/// runner nor a failed lookup holds up the drain.
async fn record_registration(
    controller: &RunnerController,
    pods: &dyn PodStore,
    runner: &RunnerTarget,
    config: &Config,
) {
    let pod = match pods.get_pod(&config.pod_namespace, &config.pod_name).await {
        Ok(Some(pod)) => pod,
        Ok(None) => return,
        Err(e) => {
            warn!("Could not fetch runner pod to record registration: {}", e);
            return;
        }
    };

    match controller.ensure_registered(runner, pod).await {
        RegistrationOutcome::Registered(pod) => {
            if let Some(id) = pod.runner_id_annotation() {
                info!("Runner {} is registered with id {}", runner.name, id);
            }
        }
        RegistrationOutcome::Requeue { cause, .. } => match cause {
            Some(err) => warn!("Could not record runner registration: {}", err),
            None => info!("Runner {} is not registered yet", runner.name),
        },
    }
}
