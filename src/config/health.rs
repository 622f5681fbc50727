// ABOUTME: Health verification configuration.
// ABOUTME: Defines HTTP liveness probe parameters with sensible defaults.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Liveness endpoint path on the deployed service.
    #[serde(default = "default_path")]
    pub path: String,

    /// Fixed interval between probes.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Per-probe timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Probe budget before the verification stage gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Expected HTTP status of a healthy response.
    #[serde(default = "default_expect_status")]
    pub expect_status: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            interval: default_interval(),
            timeout: default_timeout(),
            max_attempts: default_max_attempts(),
            expect_status: default_expect_status(),
        }
    }
}

fn default_path() -> String {
    "/health".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_expect_status() -> u16 {
    200
}
