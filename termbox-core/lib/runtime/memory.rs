//! An in-process runtime used in development mode and in tests.
//!
//! Pods live in a map guarded by a mutex that is never held across an await. Every call is
//! recorded, and individual calls can be made to fail or stall by injecting a [`Fault`].

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{TermboxError, TermboxResult};

use super::{ExecRequest, ExecStream, ListFilter, PodInfo, PodSpec, RuntimeClient};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const EXEC_BUFFER_SIZE: usize = 8 * 1024;

const RUNNING: &str = "running";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A call made against an [`InMemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `pull_image` with the reference.
    PullImage(String),

    /// `list_pods`.
    ListPods,

    /// `get_pod_info` with the pod id.
    GetPodInfo(String),

    /// `delete_pod` with the pod id.
    DeletePod(String),

    /// `create_pod` with the image.
    CreatePod(String),

    /// `exec` with the pod id.
    Exec(String),
}

/// A failure to inject into an [`InMemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Every listing fails.
    List,

    /// Fetching the info of this pod fails.
    PodInfo(String),

    /// Fetching the info of this pod never completes.
    StallPodInfo(String),

    /// Deleting this pod fails.
    DeletePod(String),

    /// Pulling this reference fails.
    PullImage(String),

    /// Every pod creation fails.
    CreatePod,

    /// Every pod creation never completes.
    StallCreatePod,
}

/// A runtime that keeps its pods in memory.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    pods: BTreeMap<String, PodInfo>,
    raw_entries: Vec<String>,
    images: BTreeSet<String>,
    calls: Vec<RuntimeCall>,
    faults: HashSet<Fault>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl InMemoryRuntime {
    /// Creates an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pod that was created at `created_at`.
    pub fn insert_pod(&self, id: &str, name: &str, created_at: DateTime<Utc>) {
        self.state().pods.insert(
            id.to_string(),
            PodInfo {
                id: id.to_string(),
                name: name.to_string(),
                created_at: created_at.timestamp(),
                status: Some(RUNNING.to_string()),
            },
        );
    }

    /// Adds a raw entry to every listing, e.g. a malformed one.
    pub fn insert_raw_entry(&self, raw: &str) {
        self.state().raw_entries.push(raw.to_string());
    }

    /// Makes matching calls fail until the fault is cleared.
    pub fn inject_fault(&self, fault: Fault) {
        self.state().faults.insert(fault);
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state().calls.clone()
    }

    /// Returns the ids of every `delete_pod` call made so far, in order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::DeletePod(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Returns the references of every `pull_image` call made so far, in order.
    pub fn pull_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::PullImage(reference) => Some(reference),
                _ => None,
            })
            .collect()
    }

    /// Returns the ids of the pods currently present.
    pub fn pod_ids(&self) -> Vec<String> {
        self.state().pods.keys().cloned().collect()
    }

    /// Returns the images that have been pulled successfully.
    pub fn cached_images(&self) -> Vec<String> {
        self.state().images.iter().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `call` and reports whether `fault` is currently injected.
    fn record(&self, call: RuntimeCall, fault: Fault) -> bool {
        let mut state = self.state();
        state.calls.push(call);
        state.faults.contains(&fault)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl RuntimeClient for InMemoryRuntime {
    async fn pull_image(&self, reference: &str) -> TermboxResult<()> {
        if self.record(
            RuntimeCall::PullImage(reference.to_string()),
            Fault::PullImage(reference.to_string()),
        ) {
            return Err(TermboxError::Runtime(format!("failed to pull {}", reference)));
        }

        self.state().images.insert(reference.to_string());
        Ok(())
    }

    async fn list_pods(&self, filter: &ListFilter) -> TermboxResult<Vec<String>> {
        if self.record(RuntimeCall::ListPods, Fault::List) {
            return Err(TermboxError::Runtime("listing is unavailable".to_string()));
        }

        let state = self.state();
        let mut entries: Vec<String> = state
            .pods
            .values()
            .filter(|pod| filter.name.as_deref().map_or(true, |name| name == pod.name))
            .map(|pod| format!("{}:{}:vm-{}:{}", pod.id, pod.name, pod.id, RUNNING))
            .collect();
        entries.extend(state.raw_entries.iter().cloned());

        Ok(entries)
    }

    async fn get_pod_info(&self, id: &str) -> TermboxResult<PodInfo> {
        let (failing, stalled) = {
            let mut state = self.state();
            state.calls.push(RuntimeCall::GetPodInfo(id.to_string()));
            (
                state.faults.contains(&Fault::PodInfo(id.to_string())),
                state.faults.contains(&Fault::StallPodInfo(id.to_string())),
            )
        };

        if stalled {
            std::future::pending::<()>().await;
        }

        if failing {
            return Err(TermboxError::Runtime(format!("failed to inspect {}", id)));
        }

        self.state()
            .pods
            .get(id)
            .cloned()
            .ok_or_else(|| TermboxError::PodNotFound(id.to_string()))
    }

    async fn delete_pod(&self, id: &str) -> TermboxResult<()> {
        if self.record(
            RuntimeCall::DeletePod(id.to_string()),
            Fault::DeletePod(id.to_string()),
        ) {
            return Err(TermboxError::Runtime(format!("failed to delete {}", id)));
        }

        self.state()
            .pods
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TermboxError::PodNotFound(id.to_string()))
    }

    async fn create_pod(&self, spec: &PodSpec) -> TermboxResult<String> {
        let stalled = self.state().faults.contains(&Fault::StallCreatePod);
        if stalled {
            self.state()
                .calls
                .push(RuntimeCall::CreatePod(spec.image.clone()));
            std::future::pending::<()>().await;
        }

        if self.record(RuntimeCall::CreatePod(spec.image.clone()), Fault::CreatePod) {
            return Err(TermboxError::Runtime(format!(
                "failed to create pod from {}",
                spec.image
            )));
        }

        let id = format!("pod-{}", &Uuid::new_v4().simple().to_string()[..12]);
        self.insert_pod(&id, &spec.name, Utc::now());

        Ok(id)
    }

    async fn exec(&self, id: &str, _request: &ExecRequest) -> TermboxResult<Box<dyn ExecStream>> {
        let exists = {
            let mut state = self.state();
            state.calls.push(RuntimeCall::Exec(id.to_string()));
            state.pods.contains_key(id)
        };

        if !exists {
            return Err(TermboxError::PodNotFound(id.to_string()));
        }

        // The "process" echoes its input back.
        let (client, process) = tokio::io::duplex(EXEC_BUFFER_SIZE);
        let (mut reader, mut writer) = tokio::io::split(process);
        tokio::spawn(async move {
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });

        Ok(Box::new(client))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
