//! Storage backend provider
//!
//! Storage definitions are the data-destructive case: removing one can
//! strand or destroy the content behind it, so teardown defaults to
//! detaching (stop tracking, leave the definition in place) and callers
//! must opt in to a real destroy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use virtflow_reconcile::{
    MutationAck, ProviderError, ProviderOps, RemoteSnapshot, RemoteTaskHandle, ResourceConfig,
    TaskStatus, TeardownPolicy, UpdateDisposition,
};

use crate::api::PveClient;
use crate::task::{self, Upid};

#[derive(Debug, Default, Serialize)]
struct StorageCreateParams {
    storage: String,

    #[serde(rename = "type")]
    kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    shared: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    disable: Option<u8>,
}

/// Update body: the API refuses identity and type changes, so neither is
/// representable here
#[derive(Debug, Default, Serialize)]
struct StorageUpdateParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    shared: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    disable: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageRow {
    storage: Option<String>,

    #[serde(rename = "type")]
    kind: Option<String>,

    path: Option<String>,
    content: Option<String>,
    nodes: Option<String>,
    shared: Option<u8>,
    disable: Option<u8>,
}

fn create_params(id: &str, config: &ResourceConfig) -> StorageCreateParams {
    StorageCreateParams {
        storage: id.to_string(),
        kind: config.get("type").unwrap_or_else(|| "dir".to_string()),
        path: config.get("path"),
        content: config.get("content"),
        nodes: config.get("nodes"),
        shared: config.get::<bool>("shared").map(u8::from),
        disable: config.get::<bool>("disable").map(u8::from),
    }
}

fn update_params(config: &ResourceConfig) -> StorageUpdateParams {
    StorageUpdateParams {
        content: config.get("content"),
        nodes: config.get("nodes"),
        shared: config.get::<bool>("shared").map(u8::from),
        disable: config.get::<bool>("disable").map(u8::from),
    }
}

fn snapshot_from(row: &StorageRow) -> RemoteSnapshot {
    let mut snapshot = RemoteSnapshot::new();
    if let Some(storage) = &row.storage {
        snapshot.remote_id = Some(storage.clone());
    }
    if let Some(kind) = &row.kind {
        snapshot.set_attribute("type", json!(kind));
    }
    if let Some(path) = &row.path {
        snapshot.set_attribute("path", json!(path));
    }
    if let Some(content) = &row.content {
        snapshot.set_attribute("content", json!(content));
    }
    if let Some(nodes) = &row.nodes {
        snapshot.set_attribute("nodes", json!(nodes));
    }
    if let Some(shared) = row.shared {
        snapshot.set_attribute("shared", json!(shared != 0));
    }
    if let Some(disable) = row.disable {
        snapshot.set_attribute("disable", json!(disable != 0));
    }
    snapshot
}

/// Provider for one storage definition
pub struct StorageProvider {
    client: PveClient,
    storage_id: String,
    destructive_teardown: bool,
}

impl StorageProvider {
    pub fn new(client: PveClient, storage_id: impl Into<String>) -> Self {
        Self {
            client,
            storage_id: storage_id.into(),
            destructive_teardown: false,
        }
    }

    /// Opt in to deleting the remote definition on teardown
    pub fn with_destructive_teardown(mut self, destructive: bool) -> Self {
        self.destructive_teardown = destructive;
        self
    }

    fn base_path(&self) -> String {
        format!("/storage/{}", self.storage_id)
    }
}

#[async_trait]
impl ProviderOps for StorageProvider {
    fn kind(&self) -> &str {
        "storage"
    }

    async fn create(&self, desired: &ResourceConfig) -> Result<MutationAck, ProviderError> {
        let body = create_params(&self.storage_id, desired);
        self.client.post("/storage", &body).await?;
        Ok(MutationAck::Complete)
    }

    async fn update(&self, desired: &ResourceConfig) -> Result<UpdateDisposition, ProviderError> {
        let body = update_params(desired);
        self.client.put(&self.base_path(), &body).await?;
        Ok(UpdateDisposition::Applied(MutationAck::Complete))
    }

    async fn delete(&self) -> Result<(), ProviderError> {
        self.client.delete(&self.base_path()).await?;
        Ok(())
    }

    async fn read(&self) -> Result<RemoteSnapshot, ProviderError> {
        let row: StorageRow = self.client.get(&self.base_path()).await?;
        let mut snapshot = snapshot_from(&row);
        if snapshot.remote_id.is_none() {
            snapshot.remote_id = Some(self.storage_id.clone());
        }
        Ok(snapshot)
    }

    async fn query_task(&self, handle: &RemoteTaskHandle) -> Result<TaskStatus, ProviderError> {
        let upid = Upid::parse(handle.as_str())?;
        Ok(task::task_status(&self.client, &upid).await?)
    }

    async fn query_running_tasks(&self) -> Result<usize, ProviderError> {
        Ok(task::running_task_count(&self.client).await?)
    }

    fn teardown(&self) -> TeardownPolicy {
        if self.destructive_teardown {
            TeardownPolicy::Destroy
        } else {
            TeardownPolicy::Detach
        }
    }
}
