// ABOUTME: SSH-backed instance executor running the container CLI on the remote host.
// ABOUTME: Detects docker/podman, pulls by digest, swaps the managed instance.

use chrono::Utc;
use std::collections::HashMap;

use crate::config::{DeploymentSpec, HostConfig};
use crate::ssh::{CommandOutput, Session, SessionConfig};
use crate::types::{InstanceId, RemoteArtifactReference, ServiceName};

use super::{ExecutionError, InstanceExecutor, InstanceHandle};

/// Label marking instances managed by this tool.
const MANAGED_LABEL: &str = "apostello.managed";
/// Label carrying the service name.
const SERVICE_LABEL: &str = "apostello.service";

/// Executor that drives the remote container CLI over one SSH session
/// per call. The session is released on every exit path.
pub struct SshExecutor;

impl SshExecutor {
    pub fn new() -> Self {
        Self
    }

    fn session_config(host: &HostConfig) -> SessionConfig {
        let user = host.user.clone().unwrap_or_else(|| {
            std::env::var("USER").unwrap_or_else(|_| "root".to_string())
        });

        let mut config = SessionConfig::new(&host.host, &user)
            .port(host.port)
            .trust_on_first_use(host.trust_first_connection);

        if let Some(key_path) = &host.key_path {
            config = config.key_path(key_path.clone());
        }
        if let Some(known_hosts) = &host.known_hosts {
            config = config.known_hosts_path(known_hosts.clone());
        }

        config
    }

    async fn connect(host: &HostConfig) -> Result<Session, ExecutionError> {
        Ok(Session::connect(Self::session_config(host)).await?)
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InstanceExecutor for SshExecutor {
    async fn update_instance(
        &self,
        spec: &DeploymentSpec,
        artifact: &RemoteArtifactReference,
    ) -> Result<InstanceHandle, ExecutionError> {
        // Resolve the instance environment before any remote work: a
        // missing required variable must fail while the old instance is
        // still untouched.
        let env = spec.resolve_instance_env().map_err(|e| match e {
            crate::error::Error::MissingEnvVar(name) => ExecutionError::MissingEnv(name),
            other => ExecutionError::StartFailed(other.to_string()),
        })?;

        let session = Self::connect(&spec.host).await?;
        let result = update_over_session(&session, spec, artifact, env).await;

        if let Err(e) = session.disconnect().await {
            tracing::warn!("failed to disconnect session cleanly: {e}");
        }

        result
    }

    async fn running_instance(
        &self,
        spec: &DeploymentSpec,
    ) -> Result<Option<InstanceId>, ExecutionError> {
        let session = Self::connect(&spec.host).await?;
        let engine = detect_engine(&session).await;
        let result = match engine {
            Ok(engine) => find_running(&session, engine, &spec.service).await,
            Err(e) => Err(e),
        };

        if let Err(e) = session.disconnect().await {
            tracing::warn!("failed to disconnect session cleanly: {e}");
        }

        result
    }
}

/// Remote container CLI flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Docker,
    Podman,
}

impl Engine {
    fn command(self) -> &'static str {
        match self {
            Engine::Docker => "docker",
            Engine::Podman => "podman",
        }
    }
}

/// Detect the container CLI on the remote host, docker first.
async fn detect_engine(session: &Session) -> Result<Engine, ExecutionError> {
    if session.command_exists("docker").await? {
        return Ok(Engine::Docker);
    }
    if session.command_exists("podman").await? {
        return Ok(Engine::Podman);
    }
    Err(ExecutionError::NoEngine)
}

async fn find_running(
    session: &Session,
    engine: Engine,
    service: &ServiceName,
) -> Result<Option<InstanceId>, ExecutionError> {
    let cmd = format!(
        "{} ps --filter label={}={} --filter label={}=true --format '{{{{.ID}}}}'",
        engine.command(),
        SERVICE_LABEL,
        service,
        MANAGED_LABEL,
    );

    let output = session.exec(&cmd).await?;
    if !output.success() {
        return Err(ExecutionError::InspectFailed(stderr_or_status(&output)));
    }

    Ok(output
        .stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| InstanceId::new(id.to_string())))
}

/// The fixed update sequence, over an established session.
async fn update_over_session(
    session: &Session,
    spec: &DeploymentSpec,
    artifact: &RemoteArtifactReference,
    env: HashMap<String, String>,
) -> Result<InstanceHandle, ExecutionError> {
    let engine = detect_engine(session).await?;

    // 1. Fetch the new artifact by its immutable digest reference. Nothing
    //    running has been touched yet, so a failure here leaves the host
    //    exactly as it was.
    tracing::info!(artifact = %artifact, "fetching artifact on remote host");
    let pull = session
        .exec(&format!("{} pull {}", engine.command(), artifact))
        .await?;
    if !pull.success() {
        return Err(ExecutionError::FetchFailed(stderr_or_status(&pull)));
    }

    let old = find_running(session, engine, &spec.service).await?;

    // 2. Stop and remove the previous instance, only now that the new
    //    artifact is confirmed present.
    let mut old_stopped = false;
    if let Some(old_id) = &old {
        tracing::info!(instance = %old_id, "stopping previous instance");
        let stop = session
            .exec(&format!("{} stop -t 10 {}", engine.command(), old_id))
            .await?;
        if !stop.success() {
            return Err(ExecutionError::StopFailed {
                id: old_id.to_string(),
                reason: stderr_or_status(&stop),
            });
        }
        old_stopped = true;

        let rm = session
            .exec(&format!("{} rm {}", engine.command(), old_id))
            .await?;
        if !rm.success() {
            tracing::warn!(instance = %old_id, "failed to remove stopped instance: {}", stderr_or_status(&rm));
        }
    }

    // 3. Start the new instance.
    let started_at = Utc::now();
    let run_cmd = build_run_command(engine, spec, artifact, &env, started_at.timestamp());
    let run = session.exec(&run_cmd).await?;
    if !run.success() {
        let reason = stderr_or_status(&run);
        return Err(if old_stopped {
            ExecutionError::PartialUpdate(reason)
        } else {
            ExecutionError::StartFailed(reason)
        });
    }

    let id = run.stdout.trim().to_string();
    if id.is_empty() {
        return Err(if old_stopped {
            ExecutionError::PartialUpdate("engine reported no container ID".to_string())
        } else {
            ExecutionError::StartFailed("engine reported no container ID".to_string())
        });
    }

    Ok(InstanceHandle {
        id: InstanceId::new(id),
        host: spec.host.host.clone(),
        port: spec.published_port(),
        started_at,
    })
}

/// Assemble the run command for the new instance.
fn build_run_command(
    engine: Engine,
    spec: &DeploymentSpec,
    artifact: &RemoteArtifactReference,
    env: &HashMap<String, String>,
    stamp: i64,
) -> String {
    let mut cmd = format!(
        "{} run -d --restart unless-stopped --name {}-{}",
        engine.command(),
        spec.service,
        stamp,
    );

    cmd.push_str(&format!(" -p {}:{}", spec.published_port(), spec.port));
    cmd.push_str(&format!(" --label {}={}", SERVICE_LABEL, spec.service));
    cmd.push_str(&format!(" --label {}=true", MANAGED_LABEL));

    // Deterministic ordering keeps the command reproducible and testable.
    let mut keys: Vec<&String> = env.keys().collect();
    keys.sort();
    for key in keys {
        cmd.push_str(&format!(" -e {}={}", key, shell_quote(&env[key])));
    }

    cmd.push(' ');
    cmd.push_str(&artifact.to_string());
    cmd
}

/// Quote a value for the remote shell. Single quotes, with embedded single
/// quotes escaped as '\''.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn stderr_or_status(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("command exited with status {}", output.exit_code)
    } else {
        stderr.to_string()
    }
}
