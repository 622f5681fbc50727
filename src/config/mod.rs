// ABOUTME: Configuration types and parsing for apostello.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and CLI overrides.

mod env_value;
mod health;
mod host;

pub use env_value::{EnvValue, resolve_env_map};
pub use health::HealthConfig;
pub use host::HostConfig;

use crate::error::{Error, Result};
use crate::types::{ImageRef, ServiceName};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "apostello.yml";
pub const CONFIG_FILENAME_ALT: &str = "apostello.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".apostello/config.yml";

/// Immutable configuration for one deployment attempt.
///
/// Constructed once per invocation from `apostello.yml` plus CLI overrides,
/// then never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentSpec {
    #[serde(deserialize_with = "deserialize_service_name")]
    pub service: ServiceName,

    /// Build context directory for the artifact builder.
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Destination repository the artifact is published to. Pinned to a
    /// digest by the publisher; the tag here never reaches the remote host.
    #[serde(deserialize_with = "deserialize_image_ref")]
    pub image: ImageRef,

    /// The one managed host this tool targets.
    pub host: HostConfig,

    /// Container port the service listens on.
    pub port: u16,

    /// Host port published on the remote machine. Defaults to `port`.
    #[serde(default)]
    pub host_port: Option<u16>,

    #[serde(default)]
    pub health: HealthConfig,

    /// Names of environment variables the deployed service requires.
    /// Resolved from the invoking environment; a missing one fails the
    /// update before the old instance is touched.
    #[serde(default)]
    pub required_env: Vec<String>,

    /// Additional environment passed to the instance.
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    /// Bounded retry budget for transient publish failures.
    #[serde(default = "default_publish_retries")]
    pub publish_retries: u32,

    /// Wall-clock bound on each publish try. A stalled push surfaces as a
    /// transient failure instead of hanging the attempt.
    #[serde(default = "default_publish_timeout", with = "humantime_serde")]
    pub publish_timeout: Duration,

    /// Overall wall-clock budget for one attempt. Exceeding it cancels the
    /// run cooperatively between stages.
    #[serde(default = "default_deadline", with = "humantime_serde")]
    pub deadline: Duration,
}

fn default_source() -> PathBuf {
    PathBuf::from(".")
}

fn default_publish_retries() -> u32 {
    3
}

fn default_publish_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_deadline() -> Duration {
    Duration::from_secs(600)
}

impl DeploymentSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// The host port the instance is published on.
    pub fn published_port(&self) -> u16 {
        self.host_port.unwrap_or(self.port)
    }

    /// Resolve the full environment for the instance: required variables
    /// from the invoking environment plus the configured extras.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingEnvVar` for the first required variable that
    /// is absent. The caller relies on this firing before any remote
    /// mutation happens.
    pub fn resolve_instance_env(&self) -> Result<HashMap<String, String>> {
        let mut resolved = resolve_env_map(&self.env)?;

        for name in &self.required_env {
            let value =
                std::env::var(name).map_err(|_| Error::MissingEnvVar(name.clone()))?;
            resolved.insert(name.clone(), value);
        }

        Ok(resolved)
    }

    pub fn template() -> Self {
        DeploymentSpec {
            service: ServiceName::new("my-app").unwrap(),
            source: PathBuf::from("."),
            image: ImageRef::parse("my-registry/my-app:latest").unwrap(),
            host: HostConfig {
                host: "server.example.com".to_string(),
                port: 22,
                user: Some("deploy".to_string()),
                key_path: None,
                known_hosts: None,
                trust_first_connection: true,
            },
            port: 8080,
            host_port: None,
            health: HealthConfig::default(),
            required_env: vec![],
            env: HashMap::new(),
            publish_retries: default_publish_retries(),
            publish_timeout: default_publish_timeout(),
            deadline: default_deadline(),
        }
    }
}

pub fn init_config(dir: &Path, service: Option<&str>, image: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut spec = DeploymentSpec::template();

    if let Some(s) = service {
        spec.service = ServiceName::new(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    if let Some(i) = image {
        spec.image = ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    let yaml = generate_template_yaml(&spec);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(spec: &DeploymentSpec) -> String {
    format!(
        r#"service: {}
image: {}
host:
  host: {}
  port: {}
  user: {}
port: {}
health:
  path: /health
"#,
        spec.service,
        spec.image,
        spec.host.host,
        spec.host.port,
        spec.host.user.as_deref().unwrap_or("deploy"),
        spec.port,
    )
}

// Custom deserializers

fn deserialize_service_name<'de, D>(deserializer: D) -> std::result::Result<ServiceName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ServiceName::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_image_ref<'de, D>(deserializer: D) -> std::result::Result<ImageRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ImageRef::parse(&s).map_err(serde::de::Error::custom)
}
