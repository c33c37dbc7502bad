//! Pod annotator
//!
//! The only place that mutates persisted state. Progress markers are written
//! as pod annotations, each at most once, through conditional patches against
//! the pod version last observed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gantry_core::domain::pod::RunnerPod;
use tracing::{debug, error};

use crate::error::PodStoreError;

/// Access to runner pods in the cluster's object store
#[async_trait]
pub trait PodStore: Send + Sync {
    /// Fetches a pod, `Ok(None)` if it does not exist
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<RunnerPod>, PodStoreError>;

    /// Merges `annotations` into the pod's annotations
    ///
    /// The patch is conditional on `pod.resource_version`: if the stored object
    /// changed since it was read the store fails with [`PodStoreError::Conflict`].
    /// Returns the pod as stored after the patch.
    async fn patch_annotations(
        &self,
        pod: &RunnerPod,
        annotations: &BTreeMap<String, String>,
    ) -> Result<RunnerPod, PodStoreError>;

    async fn delete_pod(&self, pod: &RunnerPod) -> Result<(), PodStoreError>;
}

/// Annotates the pod with `key = value` unless the key is already present
///
/// Returns the pod unchanged when the annotation exists, otherwise the pod as
/// returned by the store. Errors are returned as-is; the caller's next tick
/// re-reads the pod and tries again.
pub async fn annotate_once(
    store: &dyn PodStore,
    pod: RunnerPod,
    key: &str,
    value: &str,
) -> Result<RunnerPod, PodStoreError> {
    if pod.has_annotation(key) {
        return Ok(pod);
    }

    let patch = BTreeMap::from([(key.to_string(), value.to_string())]);

    let updated = store.patch_annotations(&pod, &patch).await.map_err(|e| {
        error!(pod = %pod.qualified_name(), key, error = %e, "Failed to patch pod annotation");
        e
    })?;

    debug!(pod = %updated.qualified_name(), key, value, "Annotated pod");

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryPodStore;
    use gantry_core::domain::pod::{ANNOTATION_RUNNER_ID, ANNOTATION_UNREGISTRATION_START};

    #[tokio::test]
    async fn test_annotate_once_is_idempotent() {
        let store = InMemoryPodStore::new();
        let pod = store.insert(RunnerPod::new("default", "runner-abc"));

        let first = annotate_once(&store, pod, ANNOTATION_RUNNER_ID, "42")
            .await
            .unwrap();
        let second = annotate_once(&store, first.clone(), ANNOTATION_RUNNER_ID, "43")
            .await
            .unwrap();

        assert_eq!(first.runner_id_annotation(), Some("42"));
        assert_eq!(second, first);
        assert_eq!(store.patch_count(), 1);
    }

    #[tokio::test]
    async fn test_annotate_once_never_overwrites() {
        let store = InMemoryPodStore::new();
        let mut pod = RunnerPod::new("default", "runner-abc");
        pod.annotations.insert(
            ANNOTATION_UNREGISTRATION_START.to_string(),
            "2026-01-01T00:00:00Z".to_string(),
        );
        let pod = store.insert(pod);

        let pod = annotate_once(
            &store,
            pod,
            ANNOTATION_UNREGISTRATION_START,
            "2026-06-01T00:00:00Z",
        )
        .await
        .unwrap();

        assert_eq!(
            pod.annotation(ANNOTATION_UNREGISTRATION_START),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(store.patch_count(), 0);
    }

    #[tokio::test]
    async fn test_annotate_once_propagates_conflict() {
        let store = InMemoryPodStore::new();
        let stale = store.insert(RunnerPod::new("default", "runner-abc"));

        // Someone else updates the pod after we read it
        annotate_once(&store, stale.clone(), "other", "value")
            .await
            .unwrap();

        let err = annotate_once(&store, stale, ANNOTATION_RUNNER_ID, "42")
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = store.get("default", "runner-abc").unwrap();
        assert_eq!(stored.runner_id_annotation(), None);
        assert_eq!(stored.annotation("other"), Some("value"));
    }
}
