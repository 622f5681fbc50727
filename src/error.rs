// ABOUTME: Application-wide error types for apostello.
// ABOUTME: Uses thiserror for ergonomic error handling and exit-code mapping.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::DeployError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Exit code for the CLI. Each failure category gets a distinct code
    /// so callers can script on the cause without parsing stderr.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Deploy(e) => deploy_exit_code(e),
            _ => 1,
        }
    }
}

fn deploy_exit_code(err: &DeployError) -> i32 {
    match err {
        DeployError::Build(_) => 2,
        DeployError::Publish(_) => 3,
        DeployError::Execution(_) => 4,
        DeployError::PartialUpdate(_) => 5,
        DeployError::Verify(_) => 6,
        DeployError::DeadlineExceeded { .. } => 6,
        DeployError::ConcurrentDeployment { .. } => 7,
        DeployError::State(_) => 1,
    }
}
