// ABOUTME: Bollard-backed registry publisher using the local engine's push endpoint.
// ABOUTME: Short-lived credentials from the environment; canonical digest from post-push inspect.

use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::query_parameters::{PushImageOptions, TagImageOptions};
use futures::StreamExt;

use crate::types::{ArtifactReference, ImageRef, RemoteArtifactReference};

use super::{PublishError, RegistryPublish};

/// Environment variable carrying a short-lived registry identity token.
pub const REGISTRY_TOKEN_VAR: &str = "APOSTELLO_REGISTRY_TOKEN";
/// Environment variables carrying username/password credentials.
pub const REGISTRY_USER_VAR: &str = "APOSTELLO_REGISTRY_USER";
pub const REGISTRY_PASSWORD_VAR: &str = "APOSTELLO_REGISTRY_PASSWORD";

/// Registry publisher backed by the local engine's Docker-compatible API.
pub struct BollardPublisher {
    client: Docker,
}

impl BollardPublisher {
    /// Connect to the local engine socket.
    pub fn connect_local() -> Result<Self, PublishError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| PublishError::Transient(e.to_string()))?;
        Ok(Self { client })
    }

    /// Resolve short-lived credentials from the invoking environment.
    ///
    /// Prefers an identity token over username/password. Credentials are
    /// read fresh on every publish and never persisted.
    fn credentials(destination: &ImageRef) -> Option<DockerCredentials> {
        let server = destination.registry().map(|s| s.to_string());

        if let Ok(token) = std::env::var(REGISTRY_TOKEN_VAR) {
            return Some(DockerCredentials {
                identitytoken: Some(token),
                serveraddress: server,
                ..Default::default()
            });
        }

        match (
            std::env::var(REGISTRY_USER_VAR),
            std::env::var(REGISTRY_PASSWORD_VAR),
        ) {
            (Ok(username), Ok(password)) => Some(DockerCredentials {
                username: Some(username),
                password: Some(password),
                serveraddress: server,
                ..Default::default()
            }),
            _ => None,
        }
    }
}

fn classify_engine_error(e: bollard::errors::Error) -> PublishError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, message }
            if *status_code == 401 || *status_code == 403 =>
        {
            PublishError::Auth(message.clone())
        }
        bollard::errors::Error::DockerResponseServerError { status_code, message }
            if *status_code == 429 =>
        {
            PublishError::Quota(message.clone())
        }
        _ => PublishError::Transient(e.to_string()),
    }
}

/// Classify an in-stream registry error string reported during a push.
fn classify_push_report(message: &str) -> PublishError {
    let lower = message.to_lowercase();
    if lower.contains("unauthorized")
        || lower.contains("denied")
        || lower.contains("authentication")
    {
        PublishError::Auth(message.to_string())
    } else if lower.contains("toomanyrequests") || lower.contains("quota") {
        PublishError::Quota(message.to_string())
    } else {
        PublishError::Transient(message.to_string())
    }
}

#[async_trait]
impl RegistryPublish for BollardPublisher {
    async fn publish(
        &self,
        artifact: &ArtifactReference,
        destination: &ImageRef,
    ) -> Result<RemoteArtifactReference, PublishError> {
        let repository = destination.repository();
        let tag = destination.tag().unwrap_or("latest").to_string();

        // Tag the built image ID under the destination repository. Tagging
        // by ID is idempotent; repeating it after a transient failure is
        // harmless.
        self.client
            .tag_image(
                artifact.image_id().as_str(),
                Some(TagImageOptions {
                    repo: Some(repository.clone()),
                    tag: Some(tag.clone()),
                    ..Default::default()
                }),
            )
            .await
            .map_err(classify_engine_error)?;

        let credentials = Self::credentials(destination);

        tracing::debug!(repository = %repository, tag = %tag, "pushing image");

        let mut stream = self.client.push_image(
            &repository,
            Some(PushImageOptions {
                tag: Some(tag.clone()),
                ..Default::default()
            }),
            credentials,
        );

        while let Some(result) = stream.next().await {
            let info = result.map_err(classify_engine_error)?;
            if let Some(message) = info.error_detail.and_then(|d| d.message) {
                return Err(classify_push_report(&message));
            }
        }

        // Resolve the registry's own canonical reference from the engine's
        // recorded repo digests rather than constructing one by hand.
        let inspect = self
            .client
            .inspect_image(&format!("{}:{}", repository, tag))
            .await
            .map_err(classify_engine_error)?;

        let repo_digests = inspect.repo_digests.unwrap_or_default();
        let canonical = repo_digests
            .iter()
            .filter_map(|entry| ImageRef::parse(entry).ok())
            .find(|r| r.repository() == repository && r.is_pinned())
            .ok_or_else(|| PublishError::MissingDigest(repository.clone()))?;

        RemoteArtifactReference::new(canonical)
            .ok_or_else(|| PublishError::MissingDigest(repository))
    }
}
