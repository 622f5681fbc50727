// ABOUTME: Artifact builder: turns a source directory into a content-addressed image.
// ABOUTME: Delegates to the local container engine; never touches the remote host.

mod bollard;

pub use bollard::BollardBuilder;

use crate::types::{ArtifactReference, ImageRef};
use async_trait::async_trait;
use std::path::Path;

/// Errors from the build stage. All terminal: a broken build will not
/// succeed on retry without a source change.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build context unreadable at {path}: {reason}")]
    ContextUnreadable { path: String, reason: String },

    #[error("container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("image build failed: {0}")]
    BuildFailed(String),

    #[error("engine returned no image ID for {0}")]
    MissingImageId(String),

    #[error("engine returned an invalid image ID: {0}")]
    InvalidImageId(String),
}

/// Builds a deployable artifact from source.
///
/// Deterministic given identical source content and build configuration:
/// two builds of the same input yield the same content-addressed reference.
#[async_trait]
pub trait ArtifactBuild: Send + Sync {
    /// Build the source at `source`, tagging the result as `image`, and
    /// return the engine-issued content-addressed reference.
    async fn build(&self, source: &Path, image: &ImageRef)
    -> Result<ArtifactReference, BuildError>;
}
