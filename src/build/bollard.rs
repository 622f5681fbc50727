// ABOUTME: Bollard-backed artifact builder for the local Docker/Podman engine.
// ABOUTME: Tars the build context, streams it to the build endpoint, resolves the image ID.

use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::BuildImageOptions;
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{Either, Full};
use std::path::Path;

use crate::types::{ArtifactReference, Digest, ImageRef};

use super::{ArtifactBuild, BuildError};

/// Artifact builder backed by the local engine's Docker-compatible API.
pub struct BollardBuilder {
    client: Docker,
}

impl BollardBuilder {
    /// Connect to the local engine socket.
    pub fn connect_local() -> Result<Self, BuildError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| BuildError::EngineUnavailable(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create a tar archive of the build context directory.
    fn create_build_context(dir: &Path) -> Result<Vec<u8>, BuildError> {
        let unreadable = |e: std::io::Error| BuildError::ContextUnreadable {
            path: dir.display().to_string(),
            reason: e.to_string(),
        };

        if !dir.is_dir() {
            return Err(BuildError::ContextUnreadable {
                path: dir.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let mut ar = tar::Builder::new(Vec::new());
        ar.append_dir_all(".", dir).map_err(unreadable)?;
        ar.into_inner().map_err(unreadable)
    }
}

#[async_trait]
impl ArtifactBuild for BollardBuilder {
    async fn build(
        &self,
        source: &Path,
        image: &ImageRef,
    ) -> Result<ArtifactReference, BuildError> {
        let tag = image.to_string();
        let tar_data = Self::create_build_context(source)?;

        tracing::debug!(context = %source.display(), tag = %tag, "building image");

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(tag.clone()),
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(tar_data)));
        let mut build_stream = self.client.build_image(options, None, Some(body));

        while let Some(result) = build_stream.next().await {
            let output = result.map_err(|e| BuildError::BuildFailed(e.to_string()))?;
            if let Some(detail) = output.error_detail {
                return Err(BuildError::BuildFailed(
                    detail.message.unwrap_or_else(|| "unknown build error".to_string()),
                ));
            }
        }

        // Resolve the content-addressed image ID from the engine rather
        // than trusting the mutable tag we just wrote.
        let inspect = self
            .client
            .inspect_image(&tag)
            .await
            .map_err(|e| BuildError::BuildFailed(format!("inspect after build: {}", e)))?;

        let id = inspect
            .id
            .ok_or_else(|| BuildError::MissingImageId(tag.clone()))?;
        let image_id = Digest::parse(&id).map_err(|e| BuildError::InvalidImageId(e.to_string()))?;

        Ok(ArtifactReference::new(image.clone(), image_id))
    }
}
