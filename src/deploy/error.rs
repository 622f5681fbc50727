// ABOUTME: Error types for deployment orchestration.
// ABOUTME: Maps component failures into the top-level taxonomy the exit codes mirror.

use chrono::{DateTime, Utc};

use crate::build::BuildError;
use crate::health::VerifyError;
use crate::registry::PublishError;
use crate::remote::ExecutionError;

use super::attempt::Stage;

/// Failure of a deployment attempt, categorized the way the CLI exit
/// codes report it.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Build failure. Terminal: no retry without a source change.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// Publish failure, after the stage's own bounded retry policy.
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// Remote update failure that left the previous instance in place.
    #[error("remote update failed: {0}")]
    Execution(ExecutionError),

    /// Remote update failure that left the host with no running instance.
    #[error("partial update, host has no running instance: {0}")]
    PartialUpdate(String),

    /// Health verification never accepted a probe.
    #[error("health verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// Another attempt holds the lease for this host.
    #[error("deployment already in flight for this host: held by {holder} (pid {pid}) since {since}")]
    ConcurrentDeployment {
        holder: String,
        pid: u32,
        since: DateTime<Utc>,
    },

    /// The overall wall-clock budget ran out before this stage.
    #[error("overall deadline exceeded before {stage} stage")]
    DeadlineExceeded { stage: Stage },

    /// Lease or known-good state could not be read or written.
    #[error("deployment state error: {0}")]
    State(String),
}

impl From<ExecutionError> for DeployError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::PartialUpdate(reason) => DeployError::PartialUpdate(reason),
            other => DeployError::Execution(other),
        }
    }
}

impl DeployError {
    /// Whether this failure warrants a rollback to the known-good
    /// reference. Only failures that may have disturbed the previously
    /// running instance qualify; if nothing was stopped, nothing needs
    /// compensating.
    pub fn rollback_applies(&self) -> bool {
        match self {
            DeployError::PartialUpdate(_) => true,
            DeployError::Verify(_) => true,
            DeployError::Execution(ExecutionError::StopFailed { .. }) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_is_promoted_to_its_own_category() {
        let err: DeployError = ExecutionError::PartialUpdate("boom".to_string()).into();
        assert!(matches!(err, DeployError::PartialUpdate(_)));
    }

    #[test]
    fn fetch_failure_needs_no_rollback() {
        let err: DeployError = ExecutionError::FetchFailed("no such image".to_string()).into();
        assert!(!err.rollback_applies());
    }

    #[test]
    fn verify_and_partial_update_roll_back() {
        assert!(DeployError::Verify(VerifyError::Timeout { attempts: 3 }).rollback_applies());
        assert!(DeployError::PartialUpdate("gone".to_string()).rollback_applies());
    }
}
