//! virtflow reconciliation engine
//!
//! This crate is the generic core shared by every virtflow resource type:
//! a reconciliation state machine that drives one resource toward its
//! desired configuration against a remote control plane, waits out
//! asynchronous server-side tasks, and tears resources down idempotently.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Orchestrator                     │
//! │   (phase, desired config, previous output)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │             virtflow-reconcile                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │        reconcile() phase dispatch         │   │
//! │  └───┬─────────────┬──────────────┬─────────┘   │
//! │  ┌───▼────┐  ┌─────▼──────┐  ┌────▼─────────┐   │
//! │  │ poller │  │  teardown  │  │  normalizer  │   │
//! │  └────────┘  └────────────┘  └──────────────┘   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait ProviderOps { create, update, ... }│   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ provider crate│  (virtflow-pve, ...)
//! └───────────────┘
//! ```
//!
//! The engine holds no cross-call state. All continuity between
//! reconciliations travels through the previous output the orchestrator
//! passes back in, so a crashed process can simply retry the same call.

pub mod error;
pub mod output;
pub mod poll;
pub mod provider;
pub mod reconcile;
pub mod request;
pub mod teardown;

// Re-exports
pub use error::{ProviderError, ReconcileError, Result, TaskError};
pub use output::{NormalizedOutput, RemoteSnapshot, normalize};
pub use poll::{DEFAULT_TIMEOUT, POLL_INTERVAL, PollConfig, SLOW_TIMEOUT, TaskScope, wait};
pub use provider::{
    MutationAck, ProviderOps, RemoteTaskHandle, TaskStatus, TeardownPolicy, UpdateDisposition,
};
pub use reconcile::reconcile;
pub use request::{Phase, ReconcileRequest, ResourceConfig};
pub use teardown::{destroy_if_present, is_absent};
