// ABOUTME: Exclusive per-host lease guarding remote mutation and the known-good marker.
// ABOUTME: Atomic file creation in the state directory; released on every exit path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::DeployError;

/// Leases older than this are considered abandoned and broken with a warning.
const STALE_AFTER_HOURS: i64 = 1;

/// Information about who holds a host lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseInfo {
    /// Hostname of the machine that holds the lease.
    pub holder: String,
    /// Process ID of the lease holder.
    pub pid: u32,
    /// When the lease was acquired.
    pub acquired_at: DateTime<Utc>,
    /// Target host the lease guards.
    pub host: String,
}

impl LeaseInfo {
    /// Create new lease info for the current process.
    pub fn new(host: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
            host: host.to_string(),
        }
    }

    /// Check if this lease is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.acquired_at;
        age.num_hours() >= STALE_AFTER_HOURS
    }
}

/// A held host lease that releases on drop.
#[derive(Debug)]
pub struct HostLease {
    path: PathBuf,
}

impl HostLease {
    /// Acquire the exclusive lease for `host` in the state directory.
    ///
    /// Uses atomic create-new file creation (no TOCTOU race). Returns
    /// `ConcurrentDeploymentError` if the lease is already held by another
    /// live process. Auto-breaks stale leases (>1 hour) with a warning;
    /// `force` breaks a live lease explicitly.
    pub(crate) fn acquire(dir: &Path, host: &str, force: bool) -> Result<Self, DeployError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| DeployError::State(format!("failed to create state directory: {e}")))?;

        let path = lease_path(dir, host);
        let info = LeaseInfo::new(host);

        if Self::try_create(&path, &info)? {
            return Ok(Self { path });
        }

        // Lease file exists - decide whether it can be broken.
        let existing = Self::read_existing(&path);
        let should_break = match &existing {
            Some(existing) if force => {
                tracing::warn!(
                    "breaking lease held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.acquired_at
                );
                true
            }
            Some(existing) if existing.is_stale() => {
                tracing::warn!(
                    "auto-breaking stale lease held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.acquired_at
                );
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!("lease info unreadable, breaking lease");
                true
            }
        };

        if !should_break {
            let existing = existing.expect("unbroken lease has readable info");
            return Err(DeployError::ConcurrentDeployment {
                holder: existing.holder,
                pid: existing.pid,
                since: existing.acquired_at,
            });
        }

        let _ = std::fs::remove_file(&path);

        if Self::try_create(&path, &info)? {
            Ok(Self { path })
        } else {
            // Another process re-acquired between break and retry.
            Err(DeployError::State(
                "lease acquired by another process during break".to_string(),
            ))
        }
    }

    /// Atomically create the lease file. Returns false if it already exists.
    fn try_create(path: &Path, info: &LeaseInfo) -> Result<bool, DeployError> {
        let json = serde_json::to_string(info)
            .map_err(|e| DeployError::State(format!("failed to serialize lease: {e}")))?;

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .map_err(|e| DeployError::State(format!("failed to write lease: {e}")))?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(DeployError::State(format!("failed to acquire lease: {e}"))),
        }
    }

    pub(crate) fn read_existing(path: &Path) -> Option<LeaseInfo> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Release the lease explicitly. Dropping the guard does the same.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove lease file {}: {e}", self.path.display());
            }
        }
    }
}

/// Path of the lease file for a host.
pub(crate) fn lease_path(dir: &Path, host: &str) -> PathBuf {
    dir.join(format!("{}.lease", sanitize_host(host)))
}

/// Make a host identifier safe as a file name component.
pub(crate) fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
