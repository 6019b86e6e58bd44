//! Vigile Server - Main entry point.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use vigile_auth::VigileConfig;
use vigile_server::{bootstrap, init_tracing, Overrides};

#[derive(Parser)]
#[command(name = "vigile-server")]
#[command(about = "Vigile - token blacklist and revocation service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/vigile.toml", env = "VIGILE_CONFIG")]
    config: PathBuf,

    /// Enable development mode (in-memory storage)
    #[arg(long, env = "VIGILE_DEV_MODE")]
    dev: bool,

    /// Overrides the provider JWT secret
    #[arg(long, env = "VIGILE_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let cli = Cli::parse();

    tracing::info!("Starting Vigile server...");
    tracing::info!("Configuration: {}", cli.config.display());

    let config = VigileConfig::load(&cli.config)?;
    let overrides = Overrides {
        dev: cli.dev,
        jwt_secret: cli.jwt_secret,
    };
    let stack = bootstrap(overrides.apply(config)?).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = stack.cleanup_service().map(|service| {
        tokio::spawn(async move {
            service.run(shutdown_rx).await;
        })
    });
    if cleanup.is_none() {
        tracing::warn!("Cleanup service disabled - expired records will accumulate");
    }

    tracing::info!("Vigile server started successfully");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    let _ = shutdown_tx.send(true);
    if let Some(task) = cleanup {
        task.await?;
    }

    Ok(())
}
