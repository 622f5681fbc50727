// ABOUTME: Entry point for the apostello CLI application.
// ABOUTME: Parses arguments, assembles components, and dispatches to command handlers.

mod cli;

use apostello::build::BollardBuilder;
use apostello::config::{self, DeploymentSpec, HostConfig};
use apostello::deploy::{
    DeployError, DeploymentAttempt, Orchestrator, Outcome, StageStatus, StateStore,
    manual_rollback,
};
use apostello::error::{Error, Result};
use apostello::health::HttpVerifier;
use apostello::registry::BollardPublisher;
use apostello::remote::SshExecutor;
use apostello::types::ImageRef;
use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Usage errors share exit code 1 with configuration errors, keeping
    // codes 2 through 7 reserved for deployment stage failures.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init {
            service,
            image,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, service.as_deref(), image.as_deref(), force)
        }
        Commands::Deploy {
            host,
            source,
            image,
            port,
            health_path,
            require_env,
            deadline,
            max_attempts,
            publish_retries,
            publish_timeout,
            force_lease,
        } => {
            let cwd = env::current_dir()?;
            let mut spec = DeploymentSpec::discover(&cwd)?;

            if let Some(host) = host {
                spec.host = HostConfig::parse(&host).map_err(Error::InvalidConfig)?;
            }
            if let Some(source) = source {
                spec.source = source;
            }
            if let Some(image) = image {
                spec.image =
                    ImageRef::parse(&image).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            }
            if let Some(port) = port {
                spec.port = port;
            }
            if let Some(path) = health_path {
                spec.health.path = path;
            }
            spec.required_env.extend(require_env);
            if let Some(deadline) = deadline {
                spec.deadline = deadline;
            }
            if let Some(max_attempts) = max_attempts {
                spec.health.max_attempts = max_attempts;
            }
            if let Some(retries) = publish_retries {
                spec.publish_retries = retries;
            }
            if let Some(timeout) = publish_timeout {
                spec.publish_timeout = timeout;
            }

            deploy(spec, force_lease).await
        }
        Commands::Rollback { force_lease } => {
            let cwd = env::current_dir()?;
            let spec = DeploymentSpec::discover(&cwd)?;
            rollback(spec, force_lease).await
        }
        Commands::Status => {
            let cwd = env::current_dir()?;
            let spec = DeploymentSpec::discover(&cwd)?;
            status(&spec)
        }
    }
}

/// Run one deployment attempt end to end.
async fn deploy(spec: DeploymentSpec, force_lease: bool) -> Result<()> {
    println!(
        "Deploying {} ({}) to {}",
        spec.service, spec.image, spec.host.host
    );

    let builder = BollardBuilder::connect_local().map_err(DeployError::from)?;
    let publisher = BollardPublisher::connect_local().map_err(DeployError::from)?;
    let executor = SshExecutor::new();
    let verifier = HttpVerifier::new();
    let store = StateStore::open_default()?;

    let orchestrator = Orchestrator::new(&builder, &publisher, &executor, &verifier, &store);
    let (record, result) = orchestrator.deploy(spec, force_lease).await;

    print_stages(&record);

    match result {
        Ok(reference) => {
            println!("  ✓ Deployed {reference}");
            Ok(())
        }
        Err(e) => {
            if let Some(Outcome::Failed { stage, rollback, .. }) = record.outcome() {
                eprintln!("  ✗ Failed during {stage}: {rollback}");
            }
            Err(e.into())
        }
    }
}

/// Redeploy the last known-good reference.
async fn rollback(spec: DeploymentSpec, force_lease: bool) -> Result<()> {
    println!("Rolling back {} on {}", spec.service, spec.host.host);

    let executor = SshExecutor::new();
    let verifier = HttpVerifier::new();
    let store = StateStore::open_default()?;

    let reference = manual_rollback(&executor, &verifier, &store, &spec, force_lease).await?;
    println!("  ✓ Rolled back to {reference}");
    Ok(())
}

/// Show the configured target and the last known-good deployment.
fn status(spec: &DeploymentSpec) -> Result<()> {
    println!("Service: {}", spec.service);
    println!("Image: {}", spec.image);
    println!(
        "Host: {}:{} (container port {})",
        spec.host.host,
        spec.host.port,
        spec.port
    );

    let store = StateStore::open_default()?;
    match store.known_good(&spec.host.host)? {
        Some(record) => {
            println!("Known good: {} (recorded {})", record.reference, record.recorded_at);
        }
        None => println!("Known good: none recorded"),
    }
    match store.lease_holder(&spec.host.host) {
        Some(info) => println!(
            "Lease: held by {} (pid {}) since {}",
            info.holder, info.pid, info.acquired_at
        ),
        None => println!("Lease: free"),
    }
    Ok(())
}

/// Print the per-stage summary from the attempt record.
fn print_stages(record: &DeploymentAttempt) {
    for stage in &record.stages {
        let mark = match stage.status {
            Some(StageStatus::Succeeded) => "✓",
            Some(StageStatus::Failed) => "✗",
            None => "…",
        };
        println!("  → {} {}", stage.stage, mark);
    }
}
