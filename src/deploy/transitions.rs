// ABOUTME: Stage transition methods for the deployment attempt.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::marker::PhantomData;

use crate::build::ArtifactBuild;
use crate::config::DeploymentSpec;
use crate::health::HealthVerify;
use crate::registry::{RegistryPublish, publish_with_retry};
use crate::remote::{InstanceExecutor, InstanceHandle};
use crate::types::{ArtifactReference, RemoteArtifactReference};

use super::attempt::{DeploymentAttempt, Outcome, RollbackDisposition, Stage, StageStatus};
use super::error::DeployError;
use super::state::{Built, Pending, Published, Updated, Verified};

/// Result type for transitions: the failed attempt comes back with the
/// error so the orchestrator can finalize its record and decide policy.
pub type TransitionResult<T, S> = Result<Attempt<T>, (Attempt<S>, DeployError)>;

/// A deployment attempt in progress, parameterized by its current state.
#[derive(Debug)]
pub struct Attempt<S> {
    pub(crate) spec: DeploymentSpec,
    pub(crate) record: DeploymentAttempt,
    pub(crate) artifact: Option<ArtifactReference>,
    pub(crate) published: Option<RemoteArtifactReference>,
    pub(crate) instance: Option<InstanceHandle>,
    pub(crate) _state: PhantomData<S>,
}

impl Attempt<Pending> {
    pub fn new(spec: DeploymentSpec) -> Self {
        let record = DeploymentAttempt::new(&spec);
        Attempt {
            spec,
            record,
            artifact: None,
            published: None,
            instance: None,
            _state: PhantomData,
        }
    }
}

impl<S> Attempt<S> {
    /// Internal helper to transition to a new state.
    fn transition<T>(self) -> Attempt<T> {
        Attempt {
            spec: self.spec,
            record: self.record,
            artifact: self.artifact,
            published: self.published,
            instance: self.instance,
            _state: PhantomData,
        }
    }

    pub fn spec(&self) -> &DeploymentSpec {
        &self.spec
    }

    pub fn record(&self) -> &DeploymentAttempt {
        &self.record
    }

    /// Finalize this attempt as failed at `stage` and return the record.
    pub fn fail(
        mut self,
        stage: Stage,
        cause: &DeployError,
        rollback: RollbackDisposition,
    ) -> DeploymentAttempt {
        self.record.finalize(Outcome::Failed {
            stage,
            cause: cause.to_string(),
            rollback,
        });
        self.record
    }
}

// =============================================================================
// Pending -> Built
// =============================================================================

impl Attempt<Pending> {
    /// Build the artifact from source.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` so the orchestrator can finalize the record.
    /// Build failures are terminal for the attempt.
    #[must_use = "attempt state must be used"]
    pub async fn build<B: ArtifactBuild + ?Sized>(
        mut self,
        builder: &B,
    ) -> TransitionResult<Built, Pending> {
        self.record.stage_started(Stage::Building);

        match builder.build(&self.spec.source, &self.spec.image).await {
            Ok(artifact) => {
                self.record.stage_finished(StageStatus::Succeeded);
                self.record.record_artifact(artifact.clone());
                self.artifact = Some(artifact);
                Ok(self.transition())
            }
            Err(e) => {
                self.record.stage_finished(StageStatus::Failed);
                Err((self, e.into()))
            }
        }
    }
}

// =============================================================================
// Built -> Published
// =============================================================================

impl Attempt<Built> {
    pub fn artifact(&self) -> &ArtifactReference {
        self.artifact.as_ref().expect("built attempt has artifact")
    }

    /// Publish the artifact, retrying transient failures within the
    /// spec's retry budget.
    #[must_use = "attempt state must be used"]
    pub async fn publish<P: RegistryPublish + ?Sized>(
        mut self,
        publisher: &P,
    ) -> TransitionResult<Published, Built> {
        self.record.stage_started(Stage::Publishing);

        let artifact = self
            .artifact
            .clone()
            .expect("built attempt has artifact");

        match publish_with_retry(
            publisher,
            &artifact,
            &self.spec.image,
            self.spec.publish_retries,
            self.spec.publish_timeout,
        )
        .await
        {
            Ok(reference) => {
                self.record.stage_finished(StageStatus::Succeeded);
                self.record.record_published(reference.clone());
                self.published = Some(reference);
                Ok(self.transition())
            }
            Err(e) => {
                self.record.stage_finished(StageStatus::Failed);
                Err((self, e.into()))
            }
        }
    }
}

// =============================================================================
// Published -> Updated
// =============================================================================

impl Attempt<Published> {
    pub fn published(&self) -> &RemoteArtifactReference {
        self.published
            .as_ref()
            .expect("published attempt has remote reference")
    }

    /// Replace the remote instance with the published artifact.
    #[must_use = "attempt state must be used"]
    pub async fn update<E: InstanceExecutor + ?Sized>(
        mut self,
        executor: &E,
    ) -> TransitionResult<Updated, Published> {
        self.record.stage_started(Stage::Updating);

        let reference = self
            .published
            .clone()
            .expect("published attempt has remote reference");

        match executor.update_instance(&self.spec, &reference).await {
            Ok(instance) => {
                self.record.stage_finished(StageStatus::Succeeded);
                self.instance = Some(instance);
                Ok(self.transition())
            }
            Err(e) => {
                self.record.stage_finished(StageStatus::Failed);
                Err((self, e.into()))
            }
        }
    }
}

// =============================================================================
// Updated -> Verified
// =============================================================================

impl Attempt<Updated> {
    pub fn instance(&self) -> &InstanceHandle {
        self.instance.as_ref().expect("updated attempt has instance")
    }

    pub fn published(&self) -> &RemoteArtifactReference {
        self.published
            .as_ref()
            .expect("published attempt has remote reference")
    }

    /// Verify the new instance answers its liveness contract.
    #[must_use = "attempt state must be used"]
    pub async fn verify<V: HealthVerify + ?Sized>(
        mut self,
        verifier: &V,
    ) -> TransitionResult<Verified, Updated> {
        self.record.stage_started(Stage::Verifying);

        let instance = self
            .instance
            .clone()
            .expect("updated attempt has instance");

        match verifier.verify(&instance, &self.spec.health).await {
            Ok(_result) => {
                self.record.stage_finished(StageStatus::Succeeded);
                Ok(self.transition())
            }
            Err(e) => {
                self.record.stage_finished(StageStatus::Failed);
                Err((self, e.into()))
            }
        }
    }
}

// =============================================================================
// Verified - Terminal State
// =============================================================================

impl Attempt<Verified> {
    pub fn published(&self) -> &RemoteArtifactReference {
        self.published
            .as_ref()
            .expect("published attempt has remote reference")
    }

    /// Finalize the attempt as succeeded.
    pub fn finish(mut self) -> (DeploymentAttempt, RemoteArtifactReference) {
        self.record.finalize(Outcome::Succeeded);
        let reference = self
            .published
            .expect("published attempt has remote reference");
        (self.record, reference)
    }
}
