//! Idempotent teardown
//!
//! The orchestrator has no transactional log of whether a delete actually
//! happened, so the same Delete reconciliation may arrive again after a
//! crash. Teardown therefore converges: deleting an already-absent target
//! is a success, both times.

use tracing::{debug, info};

use crate::error::{ProviderError, ReconcileError};
use crate::provider::{ProviderOps, TeardownPolicy};

/// Marker substrings used by control planes that flatten absence into
/// message text instead of a status code
const ABSENT_MARKERS: &[&str] = &["does not exist", "no such", "404"];

/// Whether a provider failure means the target is already gone.
///
/// Only consulted on delete paths. During create and update a not-found
/// usually points at a missing parent object and must propagate as a real
/// fault.
pub fn is_absent(err: &ProviderError) -> bool {
    match err {
        ProviderError::NotFound(_) => true,
        ProviderError::Rejected(message) => {
            let message = message.to_ascii_lowercase();
            ABSENT_MARKERS.iter().any(|marker| message.contains(marker))
        }
        ProviderError::Transient(_) => false,
    }
}

/// Run the provider's destroy operation so that repeated teardown of the
/// same resource converges to success.
///
/// A `Detach` policy skips the remote call entirely: the orchestrator
/// stops tracking the resource and the remote object stays in place.
pub async fn destroy_if_present(ops: &dyn ProviderOps) -> Result<(), ReconcileError> {
    match ops.teardown() {
        TeardownPolicy::Detach => {
            info!(kind = ops.kind(), "Teardown policy is detach; leaving remote object in place");
            Ok(())
        }
        TeardownPolicy::Destroy => match ops.delete().await {
            Ok(()) => Ok(()),
            Err(err) if is_absent(&err) => {
                debug!(kind = ops.kind(), "Target already absent; delete converges to success");
                Ok(())
            }
            Err(err) => Err(err.into()),
        },
    }
}
