// ABOUTME: Remote executor: updates the managed instance on the target host.
// ABOUTME: One SSH session per call; pull-new, stop-old, start-new in strict order.

mod executor;

pub use executor::SshExecutor;

use crate::config::DeploymentSpec;
use crate::types::{InstanceId, RemoteArtifactReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Handle to a started remote instance. The start timestamp lets the
/// health verifier reject probe results that predate this instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    pub id: InstanceId,
    /// Externally advertised address of the host the instance runs on.
    pub host: String,
    /// Host port the instance is published on.
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

/// Errors from the remote update sequence.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("SSH session failed: {0}")]
    Session(#[from] crate::ssh::Error),

    #[error("no container engine found on remote host (checked docker and podman)")]
    NoEngine,

    /// The new artifact could not be fetched. The previously running
    /// instance has not been touched.
    #[error("failed to fetch artifact on remote host: {0}")]
    FetchFailed(String),

    #[error("failed to inspect running instances: {0}")]
    InspectFailed(String),

    #[error("failed to stop previous instance {id}: {reason}")]
    StopFailed { id: String, reason: String },

    /// Start failed on a first deployment; nothing was running before, so
    /// nothing was lost.
    #[error("failed to start instance: {0}")]
    StartFailed(String),

    /// The old instance was stopped but the new one failed to start. The
    /// host has no running instance; this needs operator attention and is
    /// never silently retried.
    #[error("previous instance stopped but new instance failed to start: {0}")]
    PartialUpdate(String),

    /// A required environment variable is absent in the invoking
    /// environment. Raised before any remote mutation.
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),
}

/// Executes the fixed update sequence against the one managed host.
#[async_trait]
pub trait InstanceExecutor: Send + Sync {
    /// Replace the running instance with `artifact`:
    /// fetch-new, stop-old (only after a successful fetch), start-new.
    async fn update_instance(
        &self,
        spec: &DeploymentSpec,
        artifact: &RemoteArtifactReference,
    ) -> Result<InstanceHandle, ExecutionError>;

    /// The currently running managed instance ID, if any.
    async fn running_instance(
        &self,
        spec: &DeploymentSpec,
    ) -> Result<Option<InstanceId>, ExecutionError>;
}
