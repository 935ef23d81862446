//! Bounded polling for provider-tracked asynchronous tasks
//!
//! Mutating calls against the control plane frequently return before their
//! effect has landed; the server hands back a task that must be polled to
//! a terminal state. The poller only ever re-issues the read-only status
//! query — re-issuing the mutation could start a second conflicting
//! operation, so that is never done here.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::provider::{ProviderOps, RemoteTaskHandle, TaskStatus};

/// Reference poll cadence against the control plane
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Budget for ordinary mutations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Budget for clone/migrate/download class workers, which are known to run
/// far longer than ordinary mutations
pub const SLOW_TIMEOUT: Duration = Duration::from_secs(1800);

/// Poll cadence and budget for one wait
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Extended budget for slow worker classes
    pub fn slow() -> Self {
        Self {
            timeout: SLOW_TIMEOUT,
            ..Self::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// What to wait for
#[derive(Debug, Clone)]
pub enum TaskScope {
    /// A specific task must reach a terminal state
    Handle(RemoteTaskHandle),
    /// No running tasks may remain in the provider's scope. Used with
    /// control planes that only expose a coarse "anything still running"
    /// query.
    Quiesce,
}

enum Probe {
    Done,
    Pending,
    Failed(String),
}

/// Block (cooperatively) until the scoped work is terminal or the budget
/// elapses.
///
/// A transport failure on the status query counts as "still running" until
/// the budget runs out; a task that reports failure returns immediately.
/// Overshoot past the budget is bounded by one interval.
pub async fn wait(
    ops: &dyn ProviderOps,
    scope: TaskScope,
    config: &PollConfig,
) -> Result<(), TaskError> {
    let started = Instant::now();

    loop {
        match probe(ops, &scope).await {
            Probe::Done => return Ok(()),
            Probe::Failed(info) => return Err(TaskError::Failed(info)),
            Probe::Pending => {}
        }

        if started.elapsed() >= config.timeout {
            return Err(TaskError::Timeout(config.timeout));
        }
        sleep(config.interval).await;
    }
}

async fn probe(ops: &dyn ProviderOps, scope: &TaskScope) -> Probe {
    match scope {
        TaskScope::Handle(handle) => match ops.query_task(handle).await {
            Ok(TaskStatus::Succeeded) => Probe::Done,
            Ok(TaskStatus::Failed(info)) => Probe::Failed(info),
            Ok(TaskStatus::Running) => Probe::Pending,
            Err(err) => {
                warn!(kind = ops.kind(), task = %handle, error = %err, "Status query failed; treating task as still running");
                Probe::Pending
            }
        },
        TaskScope::Quiesce => match ops.query_running_tasks().await {
            Ok(0) => Probe::Done,
            Ok(remaining) => {
                debug!(kind = ops.kind(), remaining, "Tasks still running");
                Probe::Pending
            }
            Err(err) => {
                warn!(kind = ops.kind(), error = %err, "Running-task query failed; assuming tasks remain");
                Probe::Pending
            }
        },
    }
}
