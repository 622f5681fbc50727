// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apostello")]
#[command(about = "Single-host deployment: build, publish, update, verify, roll back")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new apostello.yml configuration file
    Init {
        /// Service name
        #[arg(long)]
        service: Option<String>,

        /// Image repository and tag
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Deploy the service to the configured host
    Deploy {
        /// Target host, overriding the config ([user@]host[:port])
        #[arg(long)]
        host: Option<String>,

        /// Build context directory, overriding the config
        #[arg(long)]
        source: Option<std::path::PathBuf>,

        /// Destination image, overriding the config
        #[arg(long)]
        image: Option<String>,

        /// Container port, overriding the config
        #[arg(long)]
        port: Option<u16>,

        /// Health endpoint path, overriding the config
        #[arg(long)]
        health_path: Option<String>,

        /// Require an environment variable (repeatable)
        #[arg(long = "require-env")]
        require_env: Vec<String>,

        /// Overall wall-clock budget, e.g. "10m" or "600s"
        #[arg(long, value_parser = humantime::parse_duration)]
        deadline: Option<std::time::Duration>,

        /// Maximum health probe attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Retry budget for transient publish failures
        #[arg(long)]
        publish_retries: Option<u32>,

        /// Wall-clock bound on each publish try, e.g. "5m"
        #[arg(long, value_parser = humantime::parse_duration)]
        publish_timeout: Option<std::time::Duration>,

        /// Break a held deployment lease for the target host
        #[arg(long)]
        force_lease: bool,
    },

    /// Redeploy the last known-good reference to the configured host
    Rollback {
        /// Break a held deployment lease for the target host
        #[arg(long)]
        force_lease: bool,
    },

    /// Show the configured target and last known-good deployment
    Status,
}
