//! Provider operation seam
//!
//! Every resource type implements [`ProviderOps`] once; the engine drives
//! it through the phase dispatcher. Provider implementations translate the
//! opaque desired configuration into their control plane's wire parameters
//! and map their own errors onto the engine taxonomy at this boundary.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::output::RemoteSnapshot;
use crate::poll::PollConfig;
use crate::request::ResourceConfig;

/// Identifier of a provider-tracked asynchronous task.
///
/// Owned transiently for the duration of one wait; never persisted into
/// the normalized output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTaskHandle(String);

impl RemoteTaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteTaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a remote task as reported by a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Succeeded,
    /// Terminal, unsuccessful. Carries the control plane's exit information.
    Failed(String),
}

/// Acknowledgement of a mutating call
#[derive(Debug, Clone)]
pub enum MutationAck {
    /// The mutation took effect before the call returned
    Complete,
    /// The control plane queued a task that must reach a terminal state
    /// before the resource can be read back
    Queued(RemoteTaskHandle),
    /// The control plane started background work without handing back a
    /// task identifier; wait until its task queue quiesces
    Background,
}

/// Outcome of asking a provider to update
#[derive(Debug, Clone)]
pub enum UpdateDisposition {
    /// The update was issued; settle it like a create
    Applied(MutationAck),
    /// The control plane has no update endpoint for this object kind.
    /// The engine degenerates to a pure read.
    Unsupported,
}

/// What a successful teardown is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPolicy {
    /// Delete the remote object
    Destroy,
    /// Leave the remote object in place and only stop tracking it.
    /// The documented default for data-destructive backends.
    Detach,
}

/// Operations the engine needs from a resource type.
///
/// Implementations are consumed behind a reference; the engine takes no
/// locks and assumes the orchestrator runs at most one reconciliation per
/// resource identity at a time.
#[async_trait]
pub trait ProviderOps: Send + Sync {
    /// Resource kind, used for logging (e.g., "vm", "storage", "acl")
    fn kind(&self) -> &str;

    /// Create the remote object from the desired configuration
    async fn create(&self, desired: &ResourceConfig) -> Result<MutationAck, ProviderError>;

    /// Converge the remote object toward the desired configuration
    async fn update(&self, desired: &ResourceConfig) -> Result<UpdateDisposition, ProviderError>;

    /// Destroy the remote object. Implementations do not wait for
    /// server-side removal to finish; the engine treats an accepted delete
    /// as terminal.
    async fn delete(&self) -> Result<(), ProviderError>;

    /// Fresh read of the remote object. Providers without a meaningful
    /// current-state endpoint return a targeted verification snapshot.
    async fn read(&self) -> Result<RemoteSnapshot, ProviderError>;

    /// Status of a specific queued task
    async fn query_task(&self, handle: &RemoteTaskHandle) -> Result<TaskStatus, ProviderError>;

    /// Number of still-running tasks in this provider's scope
    async fn query_running_tasks(&self) -> Result<usize, ProviderError>;

    /// Teardown behavior for this resource kind
    fn teardown(&self) -> TeardownPolicy {
        TeardownPolicy::Destroy
    }

    /// Polling budget for a queued task. Providers bump slow worker
    /// classes (clone, migrate, download) to the extended budget.
    fn poll_budget(&self, _handle: Option<&RemoteTaskHandle>) -> PollConfig {
        PollConfig::default()
    }

    /// Documented fallback values merged into the normalized output when
    /// neither the remote read nor the desired configuration supplies a
    /// field
    fn output_defaults(&self) -> Vec<(String, serde_json::Value)> {
        Vec::new()
    }
}
