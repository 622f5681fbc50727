// ABOUTME: Rollback to the last known-good reference, automatic and operator-initiated.
// ABOUTME: Best-effort during a failed attempt; its outcome never masks the original failure.

use crate::config::DeploymentSpec;
use crate::health::HealthVerify;
use crate::remote::InstanceExecutor;
use crate::types::RemoteArtifactReference;

use super::attempt::RollbackDisposition;
use super::error::DeployError;
use super::marker::StateStore;

/// Attempt to restore the last known-good reference after a failed update
/// or verification. Called while the host lease is still held.
///
/// Never returns an error: whatever happens is folded into the
/// disposition and reported alongside the failure that triggered it.
pub async fn rollback_to_known_good<E: InstanceExecutor + ?Sized>(
    executor: &E,
    store: &StateStore,
    spec: &DeploymentSpec,
) -> RollbackDisposition {
    let record = match store.known_good(&spec.host.host) {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::warn!("no known-good reference recorded for {}", spec.host.host);
            return RollbackDisposition::NoKnownGood;
        }
        Err(e) => return RollbackDisposition::Failed(format!("marker unreadable: {e}")),
    };

    tracing::info!("rolling back {} to {}", spec.host.host, record.reference);
    match executor.update_instance(spec, &record.reference).await {
        Ok(_) => RollbackDisposition::Succeeded(record.reference),
        Err(e) => RollbackDisposition::Failed(e.to_string()),
    }
}

/// Operator-initiated rollback: redeploy the known-good reference and
/// verify it, under the same lease discipline as a deployment.
pub async fn manual_rollback<E, V>(
    executor: &E,
    verifier: &V,
    store: &StateStore,
    spec: &DeploymentSpec,
    force_lease: bool,
) -> Result<RemoteArtifactReference, DeployError>
where
    E: InstanceExecutor + ?Sized,
    V: HealthVerify + ?Sized,
{
    let host = spec.host.host.clone();
    let lease = store.acquire_lease(&host, force_lease)?;

    let record = store.known_good(&host)?.ok_or_else(|| {
        DeployError::State(format!("no known-good reference recorded for {host}"))
    })?;

    tracing::info!("redeploying known-good reference {}", record.reference);
    let instance = executor.update_instance(spec, &record.reference).await?;
    verifier.verify(&instance, &spec.health).await?;

    lease.release();
    Ok(record.reference)
}
