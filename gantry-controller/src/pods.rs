//! Cluster pod store
//!
//! [`PodStore`] over the cluster's REST API. Annotation patches are JSON merge
//! patches that carry the observed `resourceVersion`, which makes the API
//! server reject them with 409 if the pod changed in between.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::domain::pod::{
    ContainerState, ContainerStatus, PodCondition, PodPhase, RunnerPod,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::annotator::PodStore;
use crate::error::PodStoreError;

/// HTTP implementation of PodStore
#[derive(Debug, Clone)]
pub struct HttpPodStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPodStore {
    /// Creates a new cluster pod store
    ///
    /// # Arguments
    /// * `base_url` - Cluster API base URL (e.g., "https://kubernetes.default.svc")
    /// * `token` - Bearer token, if the API requires one
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn pod_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/api/v1/namespaces/{}/pods/{}", self.base_url, namespace, name)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_pod(&self, response: reqwest::Response, pod_name: &str) -> Result<RunnerPod, PodStoreError> {
        let response = check_status(response, pod_name).await?;
        let object: PodObject = response
            .json()
            .await
            .map_err(|e| PodStoreError::Parse(format!("Failed to parse pod {}: {}", pod_name, e)))?;
        Ok(object.into())
    }
}

#[async_trait]
impl PodStore for HttpPodStore {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<RunnerPod>, PodStoreError> {
        let response = self
            .authorize(self.client.get(self.pod_url(namespace, name)))
            .send()
            .await?;

        match self.read_pod(response, &format!("{}/{}", namespace, name)).await {
            Ok(pod) => Ok(Some(pod)),
            Err(PodStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn patch_annotations(
        &self,
        pod: &RunnerPod,
        annotations: &BTreeMap<String, String>,
    ) -> Result<RunnerPod, PodStoreError> {
        let response = self
            .authorize(self.client.patch(self.pod_url(&pod.namespace, &pod.name)))
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .body(merge_patch(pod, annotations).to_string())
            .send()
            .await?;

        self.read_pod(response, &pod.qualified_name()).await
    }

    async fn delete_pod(&self, pod: &RunnerPod) -> Result<(), PodStoreError> {
        let response = self
            .authorize(self.client.delete(self.pod_url(&pod.namespace, &pod.name)))
            .send()
            .await?;

        check_status(response, &pod.qualified_name()).await?;

        tracing::info!(pod = %pod.qualified_name(), "Deleted runner pod");

        Ok(())
    }
}

/// Patch document touching only the given annotations
fn merge_patch(pod: &RunnerPod, annotations: &BTreeMap<String, String>) -> serde_json::Value {
    let mut metadata = json!({ "annotations": annotations });
    if let Some(version) = &pod.resource_version {
        metadata["resourceVersion"] = json!(version);
    }
    json!({ "metadata": metadata })
}

async fn check_status(
    response: reqwest::Response,
    pod_name: &str,
) -> Result<reqwest::Response, PodStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(match status {
        StatusCode::NOT_FOUND => PodStoreError::NotFound(pod_name.to_string()),
        StatusCode::CONFLICT => PodStoreError::Conflict(pod_name.to_string()),
        _ => PodStoreError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PodObject {
    metadata: ObjectMeta,
    #[serde(default)]
    status: PodStatusObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: String,
    resource_version: Option<String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatusObject {
    phase: Option<String>,
    #[serde(default)]
    container_statuses: Vec<ContainerStatusObject>,
    #[serde(default)]
    conditions: Vec<ConditionObject>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatusObject {
    name: String,
    #[serde(default)]
    state: ContainerStateObject,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerStateObject {
    running: Option<serde_json::Value>,
    terminated: Option<TerminatedObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerminatedObject {
    exit_code: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionObject {
    #[serde(rename = "type")]
    condition_type: String,
    status: String,
    last_transition_time: Option<DateTime<Utc>>,
}

impl From<PodObject> for RunnerPod {
    fn from(object: PodObject) -> Self {
        let phase = match object.status.phase.as_deref() {
            Some("Pending") | None => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            Some(_) => PodPhase::Unknown,
        };

        let container_statuses = object
            .status
            .container_statuses
            .into_iter()
            .map(|c| {
                let state = match (c.state.terminated, c.state.running) {
                    (Some(t), _) => ContainerState::Terminated {
                        exit_code: t.exit_code,
                    },
                    (None, Some(_)) => ContainerState::Running,
                    (None, None) => ContainerState::Waiting,
                };
                ContainerStatus {
                    name: c.name,
                    state,
                }
            })
            .collect();

        let conditions = object
            .status
            .conditions
            .into_iter()
            .map(|c| PodCondition {
                condition_type: c.condition_type,
                status: c.status,
                last_transition_time: c.last_transition_time,
            })
            .collect();

        RunnerPod {
            namespace: object.metadata.namespace,
            name: object.metadata.name,
            resource_version: object.metadata.resource_version,
            annotations: object.metadata.annotations,
            phase,
            container_statuses,
            conditions,
        }
    }
}
