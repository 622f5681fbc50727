// ABOUTME: Registry publisher: pushes a built artifact and returns its canonical repo-digest.
// ABOUTME: Classifies failures into auth/quota (terminal) and transient (retried with backoff).

mod bollard;

pub use bollard::BollardPublisher;

use crate::types::{ArtifactReference, ImageRef, RemoteArtifactReference};
use async_trait::async_trait;
use std::time::Duration;

/// Base delay for transient-failure backoff; doubles per retry.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Errors from the publish stage.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Credentials rejected. Terminal: retrying will not make them valid.
    #[error("registry authentication failed: {0}")]
    Auth(String),

    /// Registry quota or rate limit hit. Terminal.
    #[error("registry quota exceeded: {0}")]
    Quota(String),

    /// Network-level failure. Retried with bounded exponential backoff.
    #[error("transient registry failure: {0}")]
    Transient(String),

    /// The registry accepted the push but reported no digest for the
    /// destination repository.
    #[error("no canonical digest reported for {0}")]
    MissingDigest(String),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transient(_))
    }
}

/// Pushes artifacts to a remote registry.
///
/// Idempotent: re-publishing an identical artifact to the same destination
/// is a no-op success, so a retried attempt never corrupts the registry.
#[async_trait]
pub trait RegistryPublish: Send + Sync {
    /// Push `artifact` to `destination` and return the canonical
    /// `repo@digest` reference issued by the registry path. The returned
    /// reference is never hand-constructed.
    async fn publish(
        &self,
        artifact: &ArtifactReference,
        destination: &ImageRef,
    ) -> Result<RemoteArtifactReference, PublishError>;
}

/// Backoff delay before retry number `attempt` (0-based).
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt)
}

/// Publish with the bounded retry policy for transient failures.
///
/// Auth and quota failures are terminal and returned immediately; transient
/// failures are retried up to `retries` additional times with exponential
/// backoff. Each try is bounded by `timeout`: a stalled push counts as a
/// transient failure rather than hanging past the attempt's deadline.
pub async fn publish_with_retry<P: RegistryPublish + ?Sized>(
    publisher: &P,
    artifact: &ArtifactReference,
    destination: &ImageRef,
    retries: u32,
    timeout: Duration,
) -> Result<RemoteArtifactReference, PublishError> {
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(timeout, publisher.publish(artifact, destination))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(PublishError::Transient(format!(
                "publish timed out after {}",
                humantime::format_duration(timeout)
            ))),
        };
        match outcome {
            Ok(reference) => return Ok(reference),
            Err(e) if e.is_transient() && attempt < retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    "transient publish failure, backing off: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
