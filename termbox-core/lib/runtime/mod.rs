//! The container runtime capability boxes are built on.
//!
//! The control plane never owns pods. Everything it knows about them comes from a
//! [`RuntimeClient`], which is injected wherever it is needed so that tests and development
//! mode can substitute the [`InMemoryRuntime`].

mod http;
mod listing;
mod memory;

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{TermboxError, TermboxResult};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use http::*;
pub use listing::*;
pub use memory::*;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The listing kind for pods.
pub const POD_KIND: &str = "pod";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Filter for a runtime listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// The kind of item to list, e.g. `pod`.
    pub kind: String,

    /// Only list items with this name.
    pub name: Option<String>,

    /// Include items that are not running.
    pub all: bool,
}

/// Details the runtime reports about a single pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    /// The runtime-assigned pod id.
    #[serde(default)]
    pub id: String,

    /// The pod name.
    #[serde(default)]
    pub name: String,

    /// Creation time as unix seconds, as recorded by the runtime.
    pub created_at: i64,

    /// The pod's status, if the runtime reports one.
    #[serde(default)]
    pub status: Option<String>,
}

/// What to create a pod from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    /// The pod name.
    pub name: String,

    /// The `reference:version` image to run.
    pub image: String,

    /// Whether the pod's main container gets a terminal.
    pub tty: bool,
}

/// A command to attach to inside a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    /// The command and its arguments.
    pub command: Vec<String>,

    /// Whether to allocate a terminal for the command.
    pub tty: bool,
}

/// A bidirectional byte stream connected to a process running inside a pod.
pub trait ExecStream: AsyncRead + AsyncWrite + Send + Unpin {}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The operations the control plane needs from a container runtime.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Pulls `reference` into the runtime's image cache. A no-op when it is already present.
    async fn pull_image(&self, reference: &str) -> TermboxResult<()>;

    /// Lists runtime items. Each entry is a colon-delimited compound field, see [`PodEntry`].
    async fn list_pods(&self, filter: &ListFilter) -> TermboxResult<Vec<String>>;

    /// Returns the details of a pod. Fails with [`TermboxError::PodNotFound`] for unknown ids.
    async fn get_pod_info(&self, id: &str) -> TermboxResult<PodInfo>;

    /// Removes a pod. Fails with [`TermboxError::PodNotFound`] for unknown ids.
    async fn delete_pod(&self, id: &str) -> TermboxResult<()>;

    /// Creates and starts a pod, returning its id.
    async fn create_pod(&self, spec: &PodSpec) -> TermboxResult<String>;

    /// Starts a command inside a pod and returns a stream attached to it.
    async fn exec(&self, id: &str, request: &ExecRequest) -> TermboxResult<Box<dyn ExecStream>>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ListFilter {
    /// Every pod, running or not, regardless of name.
    pub fn all_pods() -> Self {
        Self {
            kind: POD_KIND.to_string(),
            name: None,
            all: true,
        }
    }
}

impl ExecRequest {
    /// An interactive request for `command`.
    pub fn interactive(command: Vec<String>) -> Self {
        Self { command, tty: true }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T> ExecStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs a runtime call, failing with [`TermboxError::RuntimeTimeout`] if it takes longer than
/// `timeout`.
pub async fn with_deadline<T>(
    operation: &'static str,
    timeout: Duration,
    call: impl Future<Output = TermboxResult<T>>,
) -> TermboxResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| TermboxError::RuntimeTimeout { operation, timeout })?
}
