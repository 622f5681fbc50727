// ABOUTME: Persistent per-host deployment state: the known-good marker and lease directory.
// ABOUTME: Markers are written atomically (temp file then rename) so readers never see a torn file.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::RemoteArtifactReference;

use super::error::DeployError;
use super::lease::{HostLease, LeaseInfo, lease_path, sanitize_host};

/// The last reference that passed health verification on a host.
///
/// Only ever written after verification succeeds, so rollback always
/// targets a reference that worked at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownGoodRecord {
    pub host: String,
    pub reference: RemoteArtifactReference,
    pub recorded_at: DateTime<Utc>,
}

/// On-disk deployment state for this orchestrator machine.
///
/// Holds one lease file and one known-good marker per host, under a
/// single state directory. The mutex serializes marker writes within
/// the process; the lease file serializes across processes.
#[derive(Debug)]
pub struct StateStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Open the default state directory, `~/.local/state/apostello`.
    pub fn open_default() -> Result<Self, DeployError> {
        let home = std::env::var("HOME")
            .map_err(|_| DeployError::State("HOME is not set".to_string()))?;
        let dir = PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("apostello");
        Ok(Self::at(dir))
    }

    /// Open a state store rooted at an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Acquire the exclusive deployment lease for `host`.
    pub fn acquire_lease(&self, host: &str, force: bool) -> Result<HostLease, DeployError> {
        HostLease::acquire(&self.dir, host, force)
    }

    /// Who currently holds the deployment lease for `host`, if anyone.
    pub fn lease_holder(&self, host: &str) -> Option<LeaseInfo> {
        HostLease::read_existing(&lease_path(&self.dir, host))
    }

    /// Read the known-good marker for `host`, if one has been recorded.
    pub fn known_good(&self, host: &str) -> Result<Option<KnownGoodRecord>, DeployError> {
        let path = self.marker_path(host);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DeployError::State(format!(
                    "failed to read known-good marker {}: {e}",
                    path.display()
                )));
            }
        };
        let record = serde_json::from_str(&content).map_err(|e| {
            DeployError::State(format!(
                "known-good marker {} is corrupted: {e}",
                path.display()
            ))
        })?;
        Ok(Some(record))
    }

    /// Record `reference` as the known-good deployment for `host`.
    ///
    /// Write-then-rename keeps the previous marker intact until the new
    /// one is fully on disk.
    pub fn record_known_good(
        &self,
        host: &str,
        reference: &RemoteArtifactReference,
    ) -> Result<(), DeployError> {
        let _guard = self.write_lock.lock();

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| DeployError::State(format!("failed to create state directory: {e}")))?;

        let record = KnownGoodRecord {
            host: host.to_string(),
            reference: reference.clone(),
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| DeployError::State(format!("failed to serialize marker: {e}")))?;

        let path = self.marker_path(host);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| DeployError::State(format!("failed to write marker: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| DeployError::State(format!("failed to commit marker: {e}")))?;

        tracing::debug!("recorded known-good reference for {host}: {reference}");
        Ok(())
    }

    fn marker_path(&self, host: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_host(host)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
