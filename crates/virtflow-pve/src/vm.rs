//! QEMU virtual machine provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use virtflow_reconcile::{
    MutationAck, PollConfig, ProviderError, ProviderOps, RemoteSnapshot, RemoteTaskHandle,
    ResourceConfig, TaskStatus, UpdateDisposition,
};

use crate::api::PveClient;
use crate::task::{self, Upid};

/// Wire parameters shared by VM create and update calls.
///
/// The API expects its own short names and 0/1 booleans; this is the only
/// place desired-config keys meet them.
#[derive(Debug, Default, Serialize)]
pub struct VmParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sockets: Option<u32>,

    /// Megabytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,

    #[serde(rename = "ostype", skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,

    #[serde(rename = "scsihw", skip_serializing_if = "Option::is_none")]
    pub scsi_hw: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "onboot", skip_serializing_if = "Option::is_none")]
    pub on_boot: Option<u8>,
}

impl VmParams {
    pub fn from_config(config: &ResourceConfig) -> Self {
        Self {
            name: config.get("name"),
            cores: config.get("cores"),
            sockets: config.get("sockets"),
            memory: config.get("memory"),
            os_type: config.get("os_type"),
            scsi_hw: config.get("scsi_hw"),
            description: config.get("description"),
            on_boot: config.get::<bool>("on_boot").map(u8::from),
        }
    }
}

#[derive(Debug, Serialize)]
struct VmCreateParams {
    vmid: u32,
    #[serde(flatten)]
    params: VmParams,
}

#[derive(Debug, Default, Deserialize)]
struct VmConfigRow {
    name: Option<String>,
    cores: Option<u32>,
    sockets: Option<u32>,
    // The API has been seen returning both a number and a string here
    memory: Option<Value>,
    ostype: Option<String>,
    scsihw: Option<String>,
    description: Option<String>,
    onboot: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct VmStatusRow {
    status: Option<String>,
}

fn loose_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Project the wire config back into the desired-config key space
fn snapshot_from(vmid: u32, config: &VmConfigRow, status: Option<&str>) -> RemoteSnapshot {
    let mut snapshot = RemoteSnapshot::new().with_remote_id(vmid.to_string());

    if let Some(name) = &config.name {
        snapshot.set_attribute("name", json!(name));
    }
    if let Some(cores) = config.cores {
        snapshot.set_attribute("cores", json!(cores));
    }
    if let Some(sockets) = config.sockets {
        snapshot.set_attribute("sockets", json!(sockets));
    }
    if let Some(memory) = config.memory.as_ref().and_then(loose_u64) {
        snapshot.set_attribute("memory", json!(memory));
    }
    if let Some(os_type) = &config.ostype {
        snapshot.set_attribute("os_type", json!(os_type));
    }
    if let Some(scsi_hw) = &config.scsihw {
        snapshot.set_attribute("scsi_hw", json!(scsi_hw));
    }
    if let Some(description) = &config.description {
        snapshot.set_attribute("description", json!(description));
    }
    if let Some(on_boot) = config.onboot {
        snapshot.set_attribute("on_boot", json!(on_boot != 0));
    }
    if let Some(status) = status {
        snapshot.set_attribute("status", json!(status));
    }

    snapshot
}

/// Provider for one QEMU virtual machine
pub struct VmProvider {
    client: PveClient,
    vmid: u32,
}

impl VmProvider {
    pub fn new(client: PveClient, vmid: u32) -> Self {
        Self { client, vmid }
    }

    fn base_path(&self) -> String {
        format!("/nodes/{}/qemu/{}", self.client.node(), self.vmid)
    }
}

#[async_trait]
impl ProviderOps for VmProvider {
    fn kind(&self) -> &str {
        "vm"
    }

    async fn create(&self, desired: &ResourceConfig) -> Result<MutationAck, ProviderError> {
        let body = VmCreateParams {
            vmid: self.vmid,
            params: VmParams::from_config(desired),
        };
        let path = format!("/nodes/{}/qemu", self.client.node());
        let data = self.client.post(&path, &body).await?;
        Ok(task::ack_from_response(&data)?)
    }

    async fn update(&self, desired: &ResourceConfig) -> Result<UpdateDisposition, ProviderError> {
        let body = VmParams::from_config(desired);
        let path = format!("{}/config", self.base_path());
        let data = self.client.put(&path, &body).await?;
        Ok(UpdateDisposition::Applied(task::ack_from_response(&data)?))
    }

    async fn delete(&self) -> Result<(), ProviderError> {
        // Removal continues server-side; once the delete is accepted the
        // engine stops tracking the object and does not follow the task.
        let path = format!("{}?purge=1&destroy-unreferenced-disks=1", self.base_path());
        self.client.delete(&path).await?;
        Ok(())
    }

    async fn read(&self) -> Result<RemoteSnapshot, ProviderError> {
        let config: VmConfigRow = self
            .client
            .get(&format!("{}/config", self.base_path()))
            .await?;
        let status: VmStatusRow = self
            .client
            .get(&format!("{}/status/current", self.base_path()))
            .await?;
        Ok(snapshot_from(self.vmid, &config, status.status.as_deref()))
    }

    async fn query_task(&self, handle: &RemoteTaskHandle) -> Result<TaskStatus, ProviderError> {
        let upid = Upid::parse(handle.as_str())?;
        Ok(task::task_status(&self.client, &upid).await?)
    }

    async fn query_running_tasks(&self) -> Result<usize, ProviderError> {
        Ok(task::running_task_count(&self.client).await?)
    }

    fn poll_budget(&self, handle: Option<&RemoteTaskHandle>) -> PollConfig {
        match handle.and_then(|h| Upid::parse(h.as_str()).ok()) {
            Some(upid) if upid.is_slow_class() => PollConfig::slow(),
            _ => PollConfig::default(),
        }
    }

    fn output_defaults(&self) -> Vec<(String, Value)> {
        vec![
            ("sockets".to_string(), json!(1)),
            ("on_boot".to_string(), json!(false)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_map_to_wire_names() {
        let config = ResourceConfig::new(
            "vm",
            "web-01",
            json!({
                "name": "web-01",
                "cores": 4,
                "memory": 2048,
                "os_type": "l26",
                "scsi_hw": "virtio-scsi-pci",
                "on_boot": true
            }),
        );

        let wire = serde_json::to_value(VmParams::from_config(&config)).unwrap();
        assert_eq!(
            wire,
            json!({
                "name": "web-01",
                "cores": 4,
                "memory": 2048,
                "ostype": "l26",
                "scsihw": "virtio-scsi-pci",
                "onboot": 1
            })
        );
    }

    #[test]
    fn test_create_params_carry_the_vmid() {
        let config = ResourceConfig::new("vm", "web-01", json!({"cores": 2}));
        let body = VmCreateParams {
            vmid: 100,
            params: VmParams::from_config(&config),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"vmid": 100, "cores": 2})
        );
    }

    #[test]
    fn test_snapshot_projects_wire_names_back() {
        let config = VmConfigRow {
            name: Some("web-01".to_string()),
            cores: Some(4),
            memory: Some(json!("2048")),
            ostype: Some("l26".to_string()),
            onboot: Some(1),
            ..Default::default()
        };

        let snapshot = snapshot_from(100, &config, Some("running"));
        assert_eq!(snapshot.remote_id.as_deref(), Some("100"));
        assert_eq!(snapshot.attributes["memory"], json!(2048));
        assert_eq!(snapshot.attributes["os_type"], json!("l26"));
        assert_eq!(snapshot.attributes["on_boot"], json!(true));
        assert_eq!(snapshot.attributes["status"], json!("running"));
        assert!(!snapshot.attributes.contains_key("scsi_hw"));
    }
}
