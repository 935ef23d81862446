//! Access-control entry provider
//!
//! ACL entries are set-like: the API has a single PUT that adds or removes
//! entries and no per-entry read or update endpoint. Update is therefore
//! unsupported, and read degenerates to scanning the ACL table for the
//! entry and reporting a verified presence flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use virtflow_reconcile::{
    MutationAck, ProviderError, ProviderOps, RemoteSnapshot, RemoteTaskHandle, ResourceConfig,
    TaskStatus, UpdateDisposition,
};

use crate::api::PveClient;
use crate::error::PveError;
use crate::task::{self, Upid};

/// Subject an ACL entry grants a role to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(String),
    Group(String),
}

/// Identity of one ACL entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub path: String,
    pub role: String,
    pub principal: Principal,
    pub propagate: bool,
}

impl AclEntry {
    pub fn from_config(config: &ResourceConfig) -> Result<Self, PveError> {
        let path = config
            .get::<String>("path")
            .ok_or_else(|| PveError::InvalidConfig("acl entry requires 'path'".to_string()))?;
        let role = config
            .get::<String>("role")
            .ok_or_else(|| PveError::InvalidConfig("acl entry requires 'role'".to_string()))?;
        let principal = match (config.get::<String>("user"), config.get::<String>("group")) {
            (Some(user), None) => Principal::User(user),
            (None, Some(group)) => Principal::Group(group),
            _ => {
                return Err(PveError::InvalidConfig(
                    "acl entry requires exactly one of 'user' or 'group'".to_string(),
                ));
            }
        };

        Ok(Self {
            path,
            role,
            principal,
            propagate: config.get::<bool>("propagate").unwrap_or(true),
        })
    }
}

#[derive(Debug, Serialize)]
struct AclParams<'a> {
    path: &'a str,
    roles: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    users: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<&'a str>,

    propagate: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    delete: Option<u8>,
}

impl<'a> AclParams<'a> {
    fn new(entry: &'a AclEntry, delete: bool) -> Self {
        let (users, groups) = match &entry.principal {
            Principal::User(user) => (Some(user.as_str()), None),
            Principal::Group(group) => (None, Some(group.as_str())),
        };
        Self {
            path: &entry.path,
            roles: &entry.role,
            users,
            groups,
            propagate: u8::from(entry.propagate),
            delete: delete.then_some(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AclRow {
    path: String,
    roleid: String,

    #[serde(rename = "type")]
    kind: String,

    ugid: String,
    propagate: Option<u8>,
}

fn find_entry<'a>(rows: &'a [AclRow], entry: &AclEntry) -> Option<&'a AclRow> {
    rows.iter().find(|row| {
        row.path == entry.path
            && row.roleid == entry.role
            && match &entry.principal {
                Principal::User(user) => row.kind == "user" && row.ugid == *user,
                Principal::Group(group) => row.kind == "group" && row.ugid == *group,
            }
    })
}

/// Provider for one ACL entry
pub struct AclProvider {
    client: PveClient,
    entry: AclEntry,
}

impl AclProvider {
    pub fn new(client: PveClient, entry: AclEntry) -> Self {
        Self { client, entry }
    }
}

#[async_trait]
impl ProviderOps for AclProvider {
    fn kind(&self) -> &str {
        "acl"
    }

    async fn create(&self, _desired: &ResourceConfig) -> Result<MutationAck, ProviderError> {
        let body = AclParams::new(&self.entry, false);
        self.client.put("/access/acl", &body).await?;
        Ok(MutationAck::Complete)
    }

    async fn update(&self, _desired: &ResourceConfig) -> Result<UpdateDisposition, ProviderError> {
        // Entries are replaced, never edited; the engine falls back to a
        // pure read.
        Ok(UpdateDisposition::Unsupported)
    }

    async fn delete(&self) -> Result<(), ProviderError> {
        let body = AclParams::new(&self.entry, true);
        self.client.put("/access/acl", &body).await?;
        Ok(())
    }

    async fn read(&self) -> Result<RemoteSnapshot, ProviderError> {
        let rows: Vec<AclRow> = self.client.get("/access/acl").await?;
        let mut snapshot = RemoteSnapshot::new();

        match find_entry(&rows, &self.entry) {
            Some(row) => {
                snapshot.set_attribute("acl_present", json!(true));
                if let Some(propagate) = row.propagate {
                    snapshot.set_attribute("propagate", json!(propagate != 0));
                }
            }
            None => {
                snapshot.set_attribute("acl_present", json!(false));
            }
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
}
