//! Phase dispatch for one reconciliation call

use tracing::{debug, info};

use crate::error::Result;
use crate::output::{NormalizedOutput, normalize};
use crate::poll::{TaskScope, wait};
use crate::provider::{MutationAck, ProviderOps, UpdateDisposition};
use crate::request::{Phase, ReconcileRequest};
use crate::teardown::destroy_if_present;

/// Reconcile one resource toward its desired configuration.
///
/// The single orchestrator-facing entry point. Ordering within one call is
/// fixed: mutate, then settle the queued task (if any), then re-read and
/// normalize. A failed call commits nothing — the orchestrator retries
/// later with the same previous output it passed in this time.
pub async fn reconcile(
    req: &ReconcileRequest,
    ops: &dyn ProviderOps,
) -> Result<NormalizedOutput> {
    match req.phase {
        Phase::Create => {
            info!(kind = ops.kind(), resource = %req.desired.key(), "Creating resource");
            let ack = ops.create(&req.desired).await?;
            settle(ops, ack).await?;
            read_back(req, ops).await
        }
        Phase::Update => {
            // A missing previous output here is an orchestrator gap, not a
            // fault: the remote object exists independently of local
            // tracking, so proceed on the desired configuration alone.
            if req.previous.is_none() {
                debug!(kind = ops.kind(), resource = %req.desired.key(), "Update without previous output");
            }
            info!(kind = ops.kind(), resource = %req.desired.key(), "Updating resource");
            match ops.update(&req.desired).await? {
                UpdateDisposition::Applied(ack) => settle(ops, ack).await?,
                UpdateDisposition::Unsupported => {
                    debug!(kind = ops.kind(), "Provider has no update operation; reading current state");
                }
            }
            read_back(req, ops).await
        }
        Phase::Delete => {
            info!(kind = ops.kind(), resource = %req.desired.key(), "Deleting resource");
            destroy_if_present(ops).await?;
            Ok(NormalizedOutput::retired())
        }
    }
}

/// Wait out whatever the mutation left running on the control plane
async fn settle(ops: &dyn ProviderOps, ack: MutationAck) -> Result<()> {
    match ack {
        MutationAck::Complete => Ok(()),
        MutationAck::Queued(handle) => {
            debug!(kind = ops.kind(), task = %handle, "Waiting for queued task");
            let budget = ops.poll_budget(Some(&handle));
            wait(ops, TaskScope::Handle(handle), &budget).await?;
            Ok(())
        }
        MutationAck::Background => {
            debug!(kind = ops.kind(), "Waiting for provider task queue to quiesce");
            let budget = ops.poll_budget(None);
            wait(ops, TaskScope::Quiesce, &budget).await?;
            Ok(())
        }
    }
}

async fn read_back(req: &ReconcileRequest, ops: &dyn ProviderOps) -> Result<NormalizedOutput> {
    let snapshot = ops.read().await?;
    Ok(normalize(
        &snapshot,
        &req.desired,
        req.previous.as_ref(),
        &ops.output_defaults(),
    ))
}
