//! Controller configuration
//!
//! Defines the parameters of a drain: where the registry and the cluster API
//! live, which runner to stop, and the grace-period timings.

use std::time::Duration;

use gantry_core::domain::scope::RunnerScope;

use crate::graceful_stop::{DEFAULT_RETRY_DELAY, DEFAULT_UNREGISTRATION_TIMEOUT};

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry API base URL (e.g., "https://api.github.com")
    pub registry_url: String,

    /// Token used to authenticate against the registry
    pub registry_token: Option<String>,

    /// Cluster API base URL (e.g., "https://kubernetes.default.svc")
    pub cluster_url: String,

    /// Token used to authenticate against the cluster API
    pub cluster_token: Option<String>,

    /// Where the runner is registered
    pub scope: RunnerScope,

    /// Runner name as registered in the registry
    pub runner_name: String,

    /// Namespace of the runner pod
    pub pod_namespace: String,

    /// Name of the runner pod
    pub pod_name: String,

    /// How long a runner may stay unregisterable before its pod is deleted anyway
    pub unregistration_timeout: Duration,

    /// Delay between ticks while unregistration is in progress
    pub retry_delay: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    ///
    /// The pod is assumed to share the runner's name and live in `default`.
    pub fn new(
        registry_url: String,
        cluster_url: String,
        scope: RunnerScope,
        runner_name: String,
    ) -> Self {
        Self {
            registry_url,
            registry_token: None,
            cluster_url,
            cluster_token: None,
            scope,
            pod_namespace: "default".to_string(),
            pod_name: runner_name.clone(),
            runner_name,
            unregistration_timeout: DEFAULT_UNREGISTRATION_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - REGISTRY_URL (required)
    /// - REGISTRY_TOKEN (optional)
    /// - CLUSTER_API_URL (required)
    /// - CLUSTER_TOKEN (optional)
    /// - RUNNER_ENTERPRISE / RUNNER_ORGANIZATION / RUNNER_REPOSITORY (one required)
    /// - RUNNER_NAME (required)
    /// - POD_NAMESPACE (optional, default: default)
    /// - POD_NAME (optional, default: RUNNER_NAME)
    /// - UNREGISTRATION_TIMEOUT (optional, seconds, default: 60)
    /// - UNREGISTRATION_RETRY_DELAY (optional, seconds, default: 10)
    pub fn from_env() -> anyhow::Result<Self> {
        let registry_url = std::env::var("REGISTRY_URL")
            .map_err(|_| anyhow::anyhow!("REGISTRY_URL environment variable not set"))?;

        let cluster_url = std::env::var("CLUSTER_API_URL")
            .map_err(|_| anyhow::anyhow!("CLUSTER_API_URL environment variable not set"))?;

        let runner_name = std::env::var("RUNNER_NAME")
            .map_err(|_| anyhow::anyhow!("RUNNER_NAME environment variable not set"))?;

        let scope = RunnerScope {
            enterprise: std::env::var("RUNNER_ENTERPRISE").ok(),
            organization: std::env::var("RUNNER_ORGANIZATION").ok(),
            repository: std::env::var("RUNNER_REPOSITORY").ok(),
        };

        let mut config = Self::new(registry_url, cluster_url, scope, runner_name);

        config.registry_token = std::env::var("REGISTRY_TOKEN").ok();
        config.cluster_token = std::env::var("CLUSTER_TOKEN").ok();

        if let Ok(namespace) = std::env::var("POD_NAMESPACE") {
            config.pod_namespace = namespace;
        }

        if let Ok(pod_name) = std::env::var("POD_NAME") {
            config.pod_name = pod_name;
        }

        if let Some(timeout) = env_secs("UNREGISTRATION_TIMEOUT") {
            config.unregistration_timeout = timeout;
        }

        if let Some(delay) = env_secs("UNREGISTRATION_RETRY_DELAY") {
            config.retry_delay = delay;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("registry_url", &self.registry_url),
            ("cluster_url", &self.cluster_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.scope.level().is_none() {
            anyhow::bail!("one of enterprise, organization or repository must be set");
        }

        if self.runner_name.is_empty() {
            anyhow::bail!("runner_name cannot be empty");
        }

        if self.pod_name.is_empty() || self.pod_namespace.is_empty() {
            anyhow::bail!("pod_name and pod_namespace cannot be empty");
        }

        if self.unregistration_timeout.is_zero() {
            anyhow::bail!("unregistration_timeout must be greater than 0");
        }

        if self.retry_delay.is_zero() {
            anyhow::bail!("retry_delay must be greater than 0");
        }

        Ok(())
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(
            "https://api.example.com".to_string(),
            "https://cluster.example.com".to_string(),
            RunnerScope::organization("acme"),
            "runner-abc".to_string(),
        )
    }

    #[test]
    fn test_default_config() {
        let config = config();
        assert_eq!(config.pod_name, "runner-abc");
        assert_eq!(config.pod_namespace, "default");
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.unregistration_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = config();

        config.registry_url = "api.example.com".to_string();
        assert!(config.validate().is_err());
        config.registry_url = "https://api.example.com".to_string();

        config.scope = RunnerScope::default();
        assert!(config.validate().is_err());
        config.scope = RunnerScope::repository("acme/app");

        config.retry_delay = Duration::ZERO;
        assert!(config.validate().is_err());
        config.retry_delay = Duration::from_secs(5);

        assert!(config.validate().is_ok());
    }
}
