// ABOUTME: Deployment orchestration: the one place failure policy is decided.
// ABOUTME: Sequences build, publish, update, verify with lease, rollback, and deadline.

mod attempt;
mod error;
mod lease;
mod marker;
mod rollback;
mod state;
mod transitions;

pub use attempt::{
    DeploymentAttempt, Outcome, RollbackDisposition, Stage, StageRecord, StageStatus,
};
pub use error::DeployError;
pub use lease::{HostLease, LeaseInfo};
pub use marker::{KnownGoodRecord, StateStore};
pub use rollback::{manual_rollback, rollback_to_known_good};
pub use state::{Built, Pending, Published, Updated, Verified};
pub use transitions::{Attempt, TransitionResult};

use crate::build::ArtifactBuild;
use crate::config::DeploymentSpec;
use crate::health::HealthVerify;
use crate::registry::RegistryPublish;
use crate::remote::InstanceExecutor;
use crate::types::RemoteArtifactReference;
use std::time::Instant;

/// Sequences one deployment attempt through its stages.
///
/// Strictly forward: each component is invoked at most once per attempt,
/// and no automatic retry crosses a stage boundary. Retrying a whole
/// attempt is an explicit operator action.
pub struct Orchestrator<'a, B: ?Sized, P: ?Sized, E: ?Sized, V: ?Sized> {
    builder: &'a B,
    publisher: &'a P,
    executor: &'a E,
    verifier: &'a V,
    store: &'a StateStore,
}

impl<'a, B, P, E, V> Orchestrator<'a, B, P, E, V>
where
    B: ArtifactBuild + ?Sized,
    P: RegistryPublish + ?Sized,
    E: InstanceExecutor + ?Sized,
    V: HealthVerify + ?Sized,
{
    pub fn new(
        builder: &'a B,
        publisher: &'a P,
        executor: &'a E,
        verifier: &'a V,
        store: &'a StateStore,
    ) -> Self {
        Self {
            builder,
            publisher,
            executor,
            verifier,
            store,
        }
    }

    /// Run one attempt to completion. Always returns the finalized attempt
    /// record; the result carries the published reference on success.
    pub async fn deploy(
        &self,
        spec: DeploymentSpec,
        force_lease: bool,
    ) -> (DeploymentAttempt, Result<RemoteArtifactReference, DeployError>) {
        let deadline = Instant::now() + spec.deadline;
        let host = spec.host.host.clone();
        let attempt = Attempt::new(spec);

        // BUILDING
        if let Some(err) = deadline_error(deadline, Stage::Building) {
            let record = attempt.fail(Stage::Building, &err, RollbackDisposition::NotNeeded);
            return (record, Err(err));
        }
        tracing::info!("building artifact");
        let attempt = match attempt.build(self.builder).await {
            Ok(attempt) => attempt,
            Err((failed, err)) => {
                let record = failed.fail(Stage::Building, &err, RollbackDisposition::NotNeeded);
                return (record, Err(err));
            }
        };

        // PUBLISHING. No remote mutation has happened before this stage
        // completes, so failures here need no compensating action.
        if let Some(err) = deadline_error(deadline, Stage::Publishing) {
            let record = attempt.fail(Stage::Publishing, &err, RollbackDisposition::NotNeeded);
            return (record, Err(err));
        }
        tracing::info!("publishing artifact");
        let attempt = match attempt.publish(self.publisher).await {
            Ok(attempt) => attempt,
            Err((failed, err)) => {
                let record = failed.fail(Stage::Publishing, &err, RollbackDisposition::NotNeeded);
                return (record, Err(err));
            }
        };

        // UPDATING, under the exclusive per-host lease. The lease guard
        // releases on every exit path below, including panics.
        if let Some(err) = deadline_error(deadline, Stage::Updating) {
            let record = attempt.fail(Stage::Updating, &err, RollbackDisposition::NotNeeded);
            return (record, Err(err));
        }
        let lease = match self.store.acquire_lease(&host, force_lease) {
            Ok(lease) => lease,
            Err(err) => {
                // Failed fast with no side effects taken.
                let record = attempt.fail(Stage::Updating, &err, RollbackDisposition::NotNeeded);
                return (record, Err(err));
            }
        };

        tracing::info!("updating remote instance");
        let attempt = match attempt.update(self.executor).await {
            Ok(attempt) => attempt,
            Err((failed, err)) => {
                let rollback = if err.rollback_applies() {
                    rollback_to_known_good(self.executor, self.store, failed.spec()).await
                } else {
                    RollbackDisposition::NotNeeded
                };
                drop(lease);
                let record = failed.fail(Stage::Updating, &err, rollback);
                return (record, Err(err));
            }
        };

        // VERIFYING. Past the deadline the run is cancelled cooperatively:
        // the new instance is left to the operator, no further remote
        // mutation happens.
        if let Some(err) = deadline_error(deadline, Stage::Verifying) {
            drop(lease);
            let record = attempt.fail(
                Stage::Verifying,
                &err,
                RollbackDisposition::Skipped("deadline exceeded".to_string()),
            );
            return (record, Err(err));
        }
        tracing::info!("verifying instance health");
        match attempt.verify(self.verifier).await {
            Ok(verified) => {
                // Persist the new known-good marker under the same lease
                // that guarded the update.
                if let Err(e) = self
                    .store
                    .record_known_good(&host, verified.published())
                {
                    tracing::error!(
                        "deployment verified but known-good marker not persisted: {e}"
                    );
                }
                drop(lease);
                let (record, reference) = verified.finish();
                (record, Ok(reference))
            }
            Err((failed, err)) => {
                let rollback =
                    rollback_to_known_good(self.executor, self.store, failed.spec()).await;
                drop(lease);
                let record = failed.fail(Stage::Verifying, &err, rollback);
                (record, Err(err))
            }
        }
    }
}

fn deadline_error(deadline: Instant, stage: Stage) -> Option<DeployError> {
    (Instant::now() >= deadline).then(|| DeployError::DeadlineExceeded { stage })
}
