//! Reconciliation error types

use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a single provider call
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The target object does not exist on the control plane.
    /// Ignorable during teardown, fatal everywhere else.
    #[error("Target not found: {0}")]
    NotFound(String),

    /// Transport-level failure of one call. Safe to retry for read-only
    /// status queries; never retried for mutations.
    #[error("Transient transport error: {0}")]
    Transient(String),

    /// The control plane refused the request (validation, conflict,
    /// permission). Surfaced verbatim to the orchestrator.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Failures of a remote asynchronous task
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task reached a terminal state other than success. Carries the
    /// exit information the control plane reported.
    #[error("Remote task failed: {0}")]
    Failed(String),

    /// The polling budget elapsed without a terminal state. The remote
    /// task may still be running; the caller should investigate rather
    /// than assume rollback.
    #[error("Timed out after {0:?} waiting for remote task")]
    Timeout(Duration),
}

/// Errors returned by one reconciliation call
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
