// ABOUTME: Health verifier: polls the deployed instance's liveness endpoint over HTTP.
// ABOUTME: Accepts only a well-formed success response, never bare port reachability.

mod http;

pub use http::HttpVerifier;

use crate::config::HealthConfig;
use crate::remote::InstanceHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of one liveness probe. Accumulated during verification and
/// discarded when the attempt concludes; never persisted.
#[derive(Debug, Clone)]
pub struct HealthResult {
    pub healthy: bool,
    /// Observed HTTP status, if the probe got a response at all.
    pub status: Option<u16>,
    pub latency: Duration,
    /// When the probe was initiated. Probes initiated before the new
    /// instance's start timestamp are never accepted as success.
    pub probed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("instance not healthy after {attempts} probe(s)")]
    Timeout { attempts: u32 },
}

/// Verifies that a deployed instance is actually serving, from a vantage
/// point equivalent to the externally advertised address.
#[async_trait]
pub trait HealthVerify: Send + Sync {
    /// Poll the instance's liveness endpoint until one probe succeeds or
    /// the attempt budget is exhausted.
    async fn verify(
        &self,
        instance: &InstanceHandle,
        health: &HealthConfig,
    ) -> Result<HealthResult, VerifyError>;
}

/// Whether a probe result counts as success for this instance.
///
/// A healthy probe initiated before the instance started could only have
/// been answered by a stale predecessor, so it is rejected.
pub fn accepts(result: &HealthResult, instance: &InstanceHandle) -> bool {
    result.healthy && result.probed_at >= instance.started_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstanceId;
    use chrono::Duration as ChronoDuration;

    fn instance(started_at: DateTime<Utc>) -> InstanceHandle {
        InstanceHandle {
            id: InstanceId::new("abc123".to_string()),
            host: "vm.example.com".to_string(),
            port: 8080,
            started_at,
        }
    }

    fn healthy_at(probed_at: DateTime<Utc>) -> HealthResult {
        HealthResult {
            healthy: true,
            status: Some(200),
            latency: Duration::from_millis(12),
            probed_at,
        }
    }

    #[test]
    fn accepts_healthy_probe_after_start() {
        let started = Utc::now();
        let result = healthy_at(started + ChronoDuration::seconds(5));
        assert!(accepts(&result, &instance(started)));
    }

    #[test]
    fn rejects_probe_issued_before_instance_start() {
        let started = Utc::now();
        let result = healthy_at(started - ChronoDuration::seconds(5));
        assert!(!accepts(&result, &instance(started)));
    }

    #[test]
    fn rejects_unhealthy_probe_regardless_of_timing() {
        let started = Utc::now();
        let mut result = healthy_at(started + ChronoDuration::seconds(5));
        result.healthy = false;
        assert!(!accepts(&result, &instance(started)));
    }
}
