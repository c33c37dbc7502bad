//! Gantry Controller
//!
//! Drains a single runner: removes it from the registry without interrupting a
//! job and deletes its pod once that is safe.
//!
//! Architecture:
//! - Configuration: loaded from environment variables
//! - Registry client: HTTP access to the runner directory
//! - Pod store: HTTP access to the cluster API
//! - Controller: graceful stop ticks, repeated until the pod is deletable
//!
//! Progress lives in pod annotations, so an interrupted drain resumes where it
//! left off when started again.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gantry_client::HttpRegistryClient;
use gantry_controller::config::Config;
use gantry_controller::drain::drain;
use gantry_controller::{HttpPodStore, RunnerController, RunnerTarget};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_controller=info,gantry_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gantry Controller");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: runner={}, scope={}, pod={}/{}",
        config.runner_name, config.scope, config.pod_namespace, config.pod_name
    );

    let mut registry = HttpRegistryClient::new(config.registry_url.clone());
    if let Some(token) = &config.registry_token {
        registry = registry.with_token(token.clone());
    }

    let pods = Arc::new(HttpPodStore::new(
        config.cluster_url.clone(),
        config.cluster_token.clone(),
    ));
    let controller = RunnerController::new(Arc::new(registry), pods.clone());
    let runner = RunnerTarget::new(config.scope.clone(), config.runner_name.clone());

    tokio::select! {
        result = drain(&controller, pods.as_ref(), &runner, &config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; the graceful stop resumes from the pod annotations on the next run");
            Ok(())
        }
    }
}
