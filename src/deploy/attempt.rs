// ABOUTME: The record of one orchestration run: per-stage status and terminal outcome.
// ABOUTME: Append-only while the run progresses, immutable once finalized.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::config::DeploymentSpec;
use crate::types::{ArtifactReference, RemoteArtifactReference};

/// A pipeline stage, in the order the orchestrator enters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Building,
    Publishing,
    Updating,
    Verifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Building => "building",
            Stage::Publishing => "publishing",
            Stage::Updating => "updating",
            Stage::Verifying => "verifying",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Failed,
}

/// One stage's entry in the attempt record.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: Option<StageStatus>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What happened to the rollback after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackDisposition {
    /// Nothing was disturbed; no compensation required.
    NotNeeded,
    /// Rollback wanted but no known-good reference is recorded for the host.
    NoKnownGood,
    /// Rollback deliberately not attempted.
    Skipped(String),
    /// The prior known-good reference was redeployed.
    Succeeded(RemoteArtifactReference),
    /// The rollback itself failed. Reported alongside, never instead of,
    /// the original failure cause.
    Failed(String),
}

impl fmt::Display for RollbackDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackDisposition::NotNeeded => write!(f, "rollback not needed"),
            RollbackDisposition::NoKnownGood => {
                write!(f, "rollback not possible: no known-good reference recorded")
            }
            RollbackDisposition::Skipped(reason) => write!(f, "rollback skipped: {}", reason),
            RollbackDisposition::Succeeded(reference) => {
                write!(f, "rolled back to {}", reference)
            }
            RollbackDisposition::Failed(reason) => write!(f, "rollback failed: {}", reason),
        }
    }
}

/// Terminal outcome of an attempt. A failure always names the stage, the
/// cause, and the rollback disposition.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeeded,
    Failed {
        stage: Stage,
        cause: String,
        rollback: RollbackDisposition,
    },
}

/// A record of one orchestration run. Created when the run starts,
/// appended-to as each stage completes, finalized at a terminal state.
#[derive(Debug, Clone)]
pub struct DeploymentAttempt {
    pub service: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
    pub artifact: Option<ArtifactReference>,
    pub published: Option<RemoteArtifactReference>,
    outcome: Option<Outcome>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentAttempt {
    pub fn new(spec: &DeploymentSpec) -> Self {
        Self {
            service: spec.service.to_string(),
            host: spec.host.host.clone(),
            started_at: Utc::now(),
            stages: Vec::new(),
            artifact: None,
            published: None,
            outcome: None,
            finished_at: None,
        }
    }

    pub(crate) fn stage_started(&mut self, stage: Stage) {
        debug_assert!(!self.is_finalized(), "attempt already finalized");
        self.stages.push(StageRecord {
            stage,
            status: None,
            started_at: Utc::now(),
            finished_at: None,
        });
    }

    pub(crate) fn stage_finished(&mut self, status: StageStatus) {
        if let Some(last) = self.stages.last_mut() {
            last.status = Some(status);
            last.finished_at = Some(Utc::now());
        }
    }

    pub(crate) fn record_artifact(&mut self, artifact: ArtifactReference) {
        self.artifact = Some(artifact);
    }

    pub(crate) fn record_published(&mut self, reference: RemoteArtifactReference) {
        self.published = Some(reference);
    }

    pub(crate) fn finalize(&mut self, outcome: Outcome) {
        if self.is_finalized() {
            return;
        }
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Succeeded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> DeploymentAttempt {
        DeploymentAttempt::new(&DeploymentSpec::template())
    }

    #[test]
    fn stages_accumulate_in_order() {
        let mut a = attempt();
        a.stage_started(Stage::Building);
        a.stage_finished(StageStatus::Succeeded);
        a.stage_started(Stage::Publishing);
        a.stage_finished(StageStatus::Failed);

        assert_eq!(a.stages.len(), 2);
        assert_eq!(a.stages[0].stage, Stage::Building);
        assert_eq!(a.stages[0].status, Some(StageStatus::Succeeded));
        assert_eq!(a.stages[1].stage, Stage::Publishing);
        assert_eq!(a.stages[1].status, Some(StageStatus::Failed));
        assert!(a.stages.iter().all(|s| s.finished_at.is_some()));
    }

    #[test]
    fn finalize_is_idempotent_and_freezes_outcome() {
        let mut a = attempt();
        a.finalize(Outcome::Failed {
            stage: Stage::Building,
            cause: "boom".to_string(),
            rollback: RollbackDisposition::NotNeeded,
        });
        let first_finish = a.finished_at;

        a.finalize(Outcome::Succeeded);
        assert!(!a.succeeded());
        assert_eq!(a.finished_at, first_finish);
    }

    #[test]
    fn new_attempt_is_not_finalized() {
        let a = attempt();
        assert!(!a.is_finalized());
        assert!(a.outcome().is_none());
        assert!(!a.succeeded());
    }
}
