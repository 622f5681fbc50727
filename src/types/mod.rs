// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types and validated newtypes to prevent reference mix-ups.

mod artifact;
mod digest;
mod id;
mod image_ref;
mod service_name;

pub use artifact::{ArtifactReference, RemoteArtifactReference};
pub use digest::{Digest, ParseDigestError};
pub use id::InstanceId;
pub use image_ref::{ImageRef, ParseImageRefError};
pub use service_name::{ServiceName, ServiceNameError};
