//! Normalized output and remote snapshots
//!
//! After a mutation settles, the engine re-reads the remote object and
//! merges it with the caller's desired configuration into a stable output
//! record. Control planes frequently do not echo back every field the
//! caller set (optional flags they silently defaulted), so the merge falls
//! back to the desired value before declaring a field absent — otherwise
//! the very next reconciliation would see spurious drift.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::ResourceConfig;

/// Fresh read of the remote object.
///
/// Attribute keys live in the desired-config key space; providers project
/// wire names back before building the snapshot.
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    /// Remote identity, when the read surface exposes one
    pub remote_id: Option<String>,

    /// Authoritative field values
    pub attributes: BTreeMap<String, Value>,
}

impl RemoteSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }
}

/// Record returned to the orchestrator after Create and Update.
///
/// Keyed identically across repeated calls so the orchestrator can diff
/// outputs without chasing key churn; attributes are held in a BTreeMap so
/// serialized output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOutput {
    /// Remote identity the orchestrator tracks
    pub remote_id: Option<String>,

    /// Merged attribute record
    pub attributes: BTreeMap<String, Value>,
}

impl NormalizedOutput {
    /// Terminal output of a successful Delete: nothing left to track
    pub fn retired() -> Self {
        Self::default()
    }

    pub fn is_retired(&self) -> bool {
        self.remote_id.is_none() && self.attributes.is_empty()
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Merge a fresh remote read with the desired configuration into the
/// stable output record.
///
/// Per-field precedence: authoritative remote value, else the desired
/// value, else a documented static default, else absent. `previous`
/// contributes only the remote identity, for read surfaces that do not
/// echo the id back; it is never required to be present.
pub fn normalize(
    snapshot: &RemoteSnapshot,
    desired: &ResourceConfig,
    previous: Option<&NormalizedOutput>,
    defaults: &[(String, Value)],
) -> NormalizedOutput {
    let mut attributes: BTreeMap<String, Value> = BTreeMap::new();

    // Lowest precedence first; later inserts overwrite
    for (key, value) in defaults {
        attributes.insert(key.clone(), value.clone());
    }
    for (key, value) in desired.fields() {
        if !value.is_null() {
            attributes.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in &snapshot.attributes {
        attributes.insert(key.clone(), value.clone());
    }

    let remote_id = snapshot
        .remote_id
        .clone()
        .or_else(|| previous.and_then(|p| p.remote_id.clone()));

    NormalizedOutput {
        remote_id,
        attributes,
    }
}
