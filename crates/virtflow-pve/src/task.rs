//! Task queue plumbing
//!
//! Mutating endpoints hand back a UPID string identifying the worker the
//! cluster spawned; its terminal status lives at a separate endpoint until
//! the task log rotates.

use serde::Deserialize;
use serde_json::Value;

use virtflow_reconcile::{MutationAck, RemoteTaskHandle, TaskStatus};

use crate::api::PveClient;
use crate::error::{PveError, Result};

/// Task identifier: `UPID:node:pid:pstart:starttime:type:id:user:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upid(String);

/// Worker classes known to run far longer than ordinary mutations
const SLOW_WORKERS: &[&str] = &["qmclone", "qmmove", "qmigrate", "imgcopy", "imgdel", "download"];

impl Upid {
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split(':').collect();
        if fields.len() < 8 || fields[0] != "UPID" {
            return Err(PveError::InvalidUpid(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Worker type field ("qmcreate", "qmclone", "vzdump", ...)
    pub fn worker_type(&self) -> &str {
        self.0.split(':').nth(5).unwrap_or("")
    }

    /// Whether this worker belongs to the extended-budget class
    pub fn is_slow_class(&self) -> bool {
        SLOW_WORKERS.contains(&self.worker_type())
    }
}

impl std::fmt::Display for Upid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Deserialize)]
struct TaskStatusRow {
    status: String,
    exitstatus: Option<String>,
}

fn interpret(row: &TaskStatusRow) -> TaskStatus {
    if row.status != "stopped" {
        return TaskStatus::Running;
    }
    match row.exitstatus.as_deref() {
        Some("OK") => TaskStatus::Succeeded,
        Some(info) => TaskStatus::Failed(info.to_string()),
        None => TaskStatus::Failed("task stopped without exit status".to_string()),
    }
}

/// Read one task's status
pub async fn task_status(client: &PveClient, upid: &Upid) -> Result<TaskStatus> {
    let path = format!("/nodes/{}/tasks/{}/status", client.node(), upid);
    let row: TaskStatusRow = client.get(&path).await?;
    Ok(interpret(&row))
}

/// Number of workers still running on the node
pub async fn running_task_count(client: &PveClient) -> Result<usize> {
    let path = format!("/nodes/{}/tasks?source=active", client.node());
    let rows: Vec<Value> = client.get(&path).await?;
    Ok(rows.len())
}

/// Interpret a mutation response: a UPID string means the cluster queued a
/// worker, null means the change already landed.
pub(crate) fn ack_from_response(data: &Value) -> Result<MutationAck> {
    match data {
        Value::Null => Ok(MutationAck::Complete),
        Value::String(raw) => {
            let upid = Upid::parse(raw)?;
            Ok(MutationAck::Queued(RemoteTaskHandle::new(upid.as_str())))
        }
        other => Err(PveError::Envelope(format!(
            "unexpected mutation response: {other}"
        ))),
    }
}
