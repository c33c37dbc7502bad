//! In-memory fakes shared by the unit tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gantry_client::{RegistryClient, RegistryError};
use gantry_core::domain::pod::{
    ContainerState, ContainerStatus, PodPhase, RUNNER_CONTAINER_NAME, RunnerPod,
};
use gantry_core::domain::runner::{RegistryRunner, RunnerStatus};
use gantry_core::domain::scope::RunnerScope;

use crate::annotator::PodStore;
use crate::clock::Clock;
use crate::error::PodStoreError;
use crate::graceful_stop::{RunnerController, RunnerTarget};

/// Pod store with resource-version conflict detection
#[derive(Default)]
pub struct InMemoryPodStore {
    pods: Mutex<HashMap<(String, String), RunnerPod>>,
    version: AtomicUsize,
    patches: AtomicUsize,
    patch_failures: Mutex<VecDeque<PodStoreError>>,
    get_failures: Mutex<VecDeque<PodStoreError>>,
    delete_failures: Mutex<VecDeque<PodStoreError>>,
}

impl InMemoryPodStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the pod under a fresh resource version and returns the stored copy
    pub fn insert(&self, mut pod: RunnerPod) -> RunnerPod {
        pod.resource_version = Some(self.next_version());
        self.pods
            .lock()
            .unwrap()
            .insert((pod.namespace.clone(), pod.name.clone()), pod.clone());
        pod
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<RunnerPod> {
        self.pods
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Makes the next patch fail with `err` without touching the pod
    pub fn fail_next_patch(&self, err: PodStoreError) {
        self.patch_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_get(&self, err: PodStoreError) {
        self.get_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_delete(&self, err: PodStoreError) {
        self.delete_failures.lock().unwrap().push_back(err);
    }

    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl PodStore for InMemoryPodStore {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<RunnerPod>, PodStoreError> {
        if let Some(err) = self.get_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.get(namespace, name))
    }

    async fn patch_annotations(
        &self,
        pod: &RunnerPod,
        annotations: &BTreeMap<String, String>,
    ) -> Result<RunnerPod, PodStoreError> {
        if let Some(err) = self.patch_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut pods = self.pods.lock().unwrap();
        let stored = pods
            .get_mut(&(pod.namespace.clone(), pod.name.clone()))
            .ok_or_else(|| PodStoreError::NotFound(pod.qualified_name()))?;

        if stored.resource_version != pod.resource_version {
            return Err(PodStoreError::Conflict(pod.qualified_name()));
        }

        stored.annotations.extend(annotations.clone());
        stored.resource_version = Some(self.next_version());
        self.patches.fetch_add(1, Ordering::SeqCst);

        Ok(stored.clone())
    }

    async fn delete_pod(&self, pod: &RunnerPod) -> Result<(), PodStoreError> {
        if let Some(err) = self.delete_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.pods
            .lock()
            .unwrap()
            .remove(&(pod.namespace.clone(), pod.name.clone()))
            .map(|_| ())
            .ok_or_else(|| PodStoreError::NotFound(pod.qualified_name()))
    }
}

/// Registry fake with a fixed runner listing and scripted remove results
///
/// Removing a runner that is not listed returns `NotFound` unless a scripted
/// result is queued.
#[derive(Default)]
pub struct ScriptedRegistry {
    runners: Mutex<Vec<RegistryRunner>>,
    remove_results: Mutex<VecDeque<Result<(), RegistryError>>>,
    list_failures: Mutex<VecDeque<RegistryError>>,
    removed: Mutex<Vec<i64>>,
    lists: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runner(self, id: i64, name: &str, busy: bool) -> Self {
        self.runners.lock().unwrap().push(runner(Some(id), name, busy));
        self
    }

    /// Registers a runner that has no id yet
    pub fn with_pending_runner(self, name: &str) -> Self {
        self.runners.lock().unwrap().push(runner(None, name, false));
        self
    }

    pub fn push_remove_result(&self, result: Result<(), RegistryError>) {
        self.remove_results.lock().unwrap().push_back(result);
    }

    pub fn fail_next_list(&self, err: RegistryError) {
        self.list_failures.lock().unwrap().push_back(err);
    }

    pub fn removed(&self) -> Vec<i64> {
        self.removed.lock().unwrap().clone()
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

fn runner(id: Option<i64>, name: &str, busy: bool) -> RegistryRunner {
    RegistryRunner {
        id,
        name: name.to_string(),
        os: "linux".to_string(),
        status: RunnerStatus::Online,
        busy,
        labels: Vec::new(),
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn list_runners(&self, _scope: &RunnerScope) -> gantry_client::Result<Vec<RegistryRunner>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.runners.lock().unwrap().clone())
    }

    async fn remove_runner(&self, _scope: &RunnerScope, id: i64) -> gantry_client::Result<()> {
        if let Some(result) = self.remove_results.lock().unwrap().pop_front() {
            if result.is_ok() {
                self.removed.lock().unwrap().push(id);
            }
            return result;
        }

        let mut runners = self.runners.lock().unwrap();
        let before = runners.len();
        runners.retain(|r| r.id != Some(id));
        if runners.len() == before {
            return Err(RegistryError::NotFound(format!("runner {}", id)));
        }

        self.removed.lock().unwrap().push(id);
        Ok(())
    }
}

/// Clock that only moves when told to
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub const RUNNER: &str = "runner-abc";

pub fn target() -> RunnerTarget {
    RunnerTarget::new(RunnerScope::organization("acme"), RUNNER)
}

/// 2026-10-18T12:00:00Z
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

/// A controller wired to in-memory fakes, with the clock at [`t0`]
pub struct Harness {
    pub registry: Arc<ScriptedRegistry>,
    pub pods: Arc<InMemoryPodStore>,
    pub clock: Arc<FixedClock>,
    pub controller: RunnerController,
}

impl Harness {
    pub fn new(registry: ScriptedRegistry) -> Self {
        let registry = Arc::new(registry);
        let pods = Arc::new(InMemoryPodStore::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let controller = RunnerController::with_clock(
            registry.clone(),
            pods.clone(),
            clock.clone(),
        );

        Self {
            registry,
            pods,
            clock,
            controller,
        }
    }

    /// Stores a running pod for [`RUNNER`] with the given annotations
    pub fn pod(&self, annotations: &[(&str, &str)]) -> RunnerPod {
        let mut pod = RunnerPod::new("default", RUNNER);
        pod.phase = PodPhase::Running;
        pod.container_statuses.push(ContainerStatus {
            name: RUNNER_CONTAINER_NAME.to_string(),
            state: ContainerState::Running,
        });
        for (key, value) in annotations {
            pod.annotations.insert(key.to_string(), value.to_string());
        }
        self.store(pod)
    }

    /// Saves a locally modified pod so later patches start from it
    pub fn store(&self, pod: RunnerPod) -> RunnerPod {
        self.pods.insert(pod)
    }
}

/// Marks the runner container as terminated with `exit_code`
pub fn with_runner_exit(mut pod: RunnerPod, exit_code: i32) -> RunnerPod {
    for status in &mut pod.container_statuses {
        if status.name == RUNNER_CONTAINER_NAME {
            status.state = ContainerState::Terminated { exit_code };
        }
    }
    pod
}
