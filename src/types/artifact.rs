// ABOUTME: Artifact reference types produced by the builder and publisher.
// ABOUTME: Local references carry the engine image ID, remote ones the registry repo-digest.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::digest::Digest;
use super::image_ref::ImageRef;

/// A locally built artifact: the image reference it was tagged as, plus the
/// engine-issued content-addressed image ID. Building identical input twice
/// yields the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    image: ImageRef,
    image_id: Digest,
}

impl ArtifactReference {
    pub fn new(image: ImageRef, image_id: Digest) -> Self {
        Self { image, image_id }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn image_id(&self) -> &Digest {
        &self.image_id
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.image, self.image_id.short())
    }
}

/// A published artifact: the canonical `repo@digest` reference issued by the
/// registry path after a push. This is the only form the remote executor
/// ever pulls; mutable tags never cross the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteArtifactReference(ImageRef);

impl RemoteArtifactReference {
    /// Wrap a pinned reference. Returns `None` if the reference carries no
    /// digest, since an unpinned reference must never reach the remote host.
    pub fn new(reference: ImageRef) -> Option<Self> {
        reference.is_pinned().then_some(Self(reference))
    }

    pub fn as_image_ref(&self) -> &ImageRef {
        &self.0
    }

    pub fn digest(&self) -> &Digest {
        self.0
            .digest()
            .expect("remote artifact reference is always pinned")
    }
}

impl fmt::Display for RemoteArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ImageRef serializes through its string form so the known-good marker
// file stays human-readable.
impl Serialize for ImageRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ImageRef::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";

    #[test]
    fn remote_reference_requires_digest() {
        let unpinned = ImageRef::parse("ghcr.io/acme/app:latest").unwrap();
        assert!(RemoteArtifactReference::new(unpinned).is_none());

        let pinned = ImageRef::parse(&format!("ghcr.io/acme/app@sha256:{HEX}")).unwrap();
        let remote = RemoteArtifactReference::new(pinned).unwrap();
        assert_eq!(remote.digest().hex(), HEX);
    }

    #[test]
    fn remote_reference_serde_round_trip() {
        let pinned = ImageRef::parse(&format!("ghcr.io/acme/app@sha256:{HEX}")).unwrap();
        let remote = RemoteArtifactReference::new(pinned).unwrap();
        let json = serde_json::to_string(&remote).unwrap();
        assert_eq!(json, format!("\"ghcr.io/acme/app@sha256:{HEX}\""));
        let back: RemoteArtifactReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, remote);
    }
}
