//! Proxmox VE provider for virtflow
//!
//! Implements the `virtflow-reconcile` provider seam against a Proxmox VE
//! cluster: a thin JSON client over the REST API, UPID task plumbing, and
//! one `ProviderOps` implementation per resource kind.
//!
//! # Resource kinds
//!
//! - **vm**: QEMU virtual machines. Mutations queue cluster-side workers
//!   (UPID tasks) that the engine polls to a terminal state.
//! - **storage**: storage definitions. Synchronous mutations; teardown
//!   detaches by default because deleting a definition is
//!   data-destructive.
//! - **acl**: access-control entries. Set-like PUT interface with no
//!   update or per-entry read endpoint.

pub mod acl;
pub mod api;
pub mod error;
pub mod storage;
pub mod task;
pub mod vm;

// Re-exports
pub use acl::{AclEntry, AclProvider, Principal};
pub use api::{ClientConfig, PveClient};
pub use error::{PveError, Result};
pub use storage::StorageProvider;
pub use task::Upid;
pub use vm::{VmParams, VmProvider};
