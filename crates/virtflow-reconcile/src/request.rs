//! Reconciliation request types

use serde::{Deserialize, Serialize};

use crate::output::NormalizedOutput;

/// Lifecycle phase of one reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Bring a new resource into existence
    Create,
    /// Converge an existing resource toward the desired configuration
    Update,
    /// Tear the resource down and stop tracking it
    Delete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Create => write!(f, "create"),
            Phase::Update => write!(f, "update"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// Desired configuration for a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "vm", "storage", "acl")
    pub resource_type: String,

    /// Resource identifier
    pub id: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            config,
        }
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Iterate over the configured fields, if the config is an object
    pub fn fields(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.config.as_object().into_iter().flatten()
    }
}

/// Input to one reconciliation call.
///
/// `previous` is present on Update and Delete under correct orchestrator
/// usage, but the engine never requires it: a crash between runs can leave
/// the orchestrator without a persisted output for an object that still
/// exists remotely.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub phase: Phase,
    pub desired: ResourceConfig,
    pub previous: Option<NormalizedOutput>,
}

impl ReconcileRequest {
    pub fn new(phase: Phase, desired: ResourceConfig) -> Self {
        Self {
            phase,
            desired,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: NormalizedOutput) -> Self {
        self.previous = Some(previous);
        self
    }
}
