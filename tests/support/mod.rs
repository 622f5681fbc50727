// ABOUTME: Test support utilities.
// ABOUTME: Provides in-process component mocks and fixtures for integration tests.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use apostello::build::{ArtifactBuild, BuildError};
use apostello::config::{DeploymentSpec, HealthConfig};
use apostello::health::{HealthResult, HealthVerify, VerifyError};
use apostello::registry::{PublishError, RegistryPublish};
use apostello::remote::{ExecutionError, InstanceExecutor, InstanceHandle};
use apostello::types::{
    ArtifactReference, Digest, ImageRef, InstanceId, RemoteArtifactReference,
};

pub const HEX: &str = "a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";
pub const OLD_HEX: &str = "b4ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("apostello=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A deployment spec for tests, never pointed at a real host.
#[allow(dead_code)]
pub fn test_spec() -> DeploymentSpec {
    DeploymentSpec::from_yaml(
        r#"
service: orders
image: ghcr.io/acme/orders:latest
host:
  host: vm.test.invalid
  user: deploy
port: 8080
"#,
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn built_artifact() -> ArtifactReference {
    ArtifactReference::new(
        ImageRef::parse("ghcr.io/acme/orders:latest").unwrap(),
        Digest::parse(&format!("sha256:{HEX}")).unwrap(),
    )
}

#[allow(dead_code)]
pub fn published_reference() -> RemoteArtifactReference {
    RemoteArtifactReference::new(
        ImageRef::parse(&format!("ghcr.io/acme/orders@sha256:{HEX}")).unwrap(),
    )
    .unwrap()
}

/// A distinct reference standing in for a previous deployment.
#[allow(dead_code)]
pub fn previous_reference() -> RemoteArtifactReference {
    RemoteArtifactReference::new(
        ImageRef::parse(&format!("ghcr.io/acme/orders@sha256:{OLD_HEX}")).unwrap(),
    )
    .unwrap()
}

/// Builder mock: succeeds with a fixed artifact, or always fails.
pub struct MockBuilder {
    pub calls: AtomicU32,
    pub fail: bool,
}

#[allow(dead_code)]
impl MockBuilder {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl ArtifactBuild for MockBuilder {
    async fn build(
        &self,
        _source: &Path,
        _image: &ImageRef,
    ) -> Result<ArtifactReference, BuildError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(BuildError::BuildFailed("step 3/7 failed".to_string()))
        } else {
            Ok(built_artifact())
        }
    }
}

/// Publisher mock: succeeds with the canonical pinned reference, or fails.
pub struct MockPublisher {
    pub calls: AtomicU32,
    pub fail: Option<fn() -> PublishError>,
}

#[allow(dead_code)]
impl MockPublisher {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: None,
        }
    }

    pub fn failing(error: fn() -> PublishError) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: Some(error),
        }
    }
}

#[async_trait]
impl RegistryPublish for MockPublisher {
    async fn publish(
        &self,
        _artifact: &ArtifactReference,
        _destination: &ImageRef,
    ) -> Result<RemoteArtifactReference, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail {
            Some(error) => Err(error()),
            None => Ok(published_reference()),
        }
    }
}

/// Executor mock: records every reference it deployed, and pops queued
/// failures in order before succeeding.
pub struct MockExecutor {
    pub deployed: Mutex<Vec<RemoteArtifactReference>>,
    failures: Mutex<VecDeque<ExecutionError>>,
}

#[allow(dead_code)]
impl MockExecutor {
    pub fn succeeding() -> Self {
        Self {
            deployed: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Fail the next calls with the given errors (in order), then succeed.
    pub fn failing_with(errors: Vec<ExecutionError>) -> Self {
        Self {
            deployed: Mutex::new(Vec::new()),
            failures: Mutex::new(errors.into()),
        }
    }

    pub fn deployed_references(&self) -> Vec<RemoteArtifactReference> {
        self.deployed.lock().clone()
    }
}

#[async_trait]
impl InstanceExecutor for MockExecutor {
    async fn update_instance(
        &self,
        spec: &DeploymentSpec,
        artifact: &RemoteArtifactReference,
    ) -> Result<InstanceHandle, ExecutionError> {
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.deployed.lock().push(artifact.clone());
        Ok(InstanceHandle {
            id: InstanceId::new(format!("inst-{}", artifact.digest().short())),
            host: spec.host.host.clone(),
            port: spec.published_port(),
            started_at: Utc::now(),
        })
    }

    async fn running_instance(
        &self,
        _spec: &DeploymentSpec,
    ) -> Result<Option<InstanceId>, ExecutionError> {
        Ok(self
            .deployed
            .lock()
            .last()
            .map(|r| InstanceId::new(format!("inst-{}", r.digest().short()))))
    }
}

/// Verifier mock: fails a fixed number of times, then accepts.
pub struct MockVerifier {
    pub calls: AtomicU32,
    failures: AtomicU32,
}

#[allow(dead_code)]
impl MockVerifier {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
        }
    }

    pub fn failing(times: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(times),
        }
    }
}

#[async_trait]
impl HealthVerify for MockVerifier {
    async fn verify(
        &self,
        _instance: &InstanceHandle,
        health: &HealthConfig,
    ) -> Result<HealthResult, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then(|| n - 1)
            })
            .is_ok();
        if failing {
            Err(VerifyError::Timeout {
                attempts: health.max_attempts,
            })
        } else {
            Ok(HealthResult {
                healthy: true,
                status: Some(health.expect_status),
                latency: std::time::Duration::from_millis(7),
                probed_at: Utc::now(),
            })
        }
    }
}
