//! Vigile CLI - Command line interface.
//!
//! Operates directly on the configured blacklist storage.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use vigile_auth::{mask_identifier, ProviderAdapter, VigileConfig};
use vigile_server::{bootstrap, init_tracing, Overrides, Stack};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "vigile")]
#[command(about = "Vigile CLI - Verify, blacklist and revoke bearer tokens")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/vigile.toml", env = "VIGILE_CONFIG")]
    config: PathBuf,

    /// Use in-memory storage
    #[arg(long, env = "VIGILE_DEV_MODE")]
    dev: bool,

    /// Overrides the provider JWT secret
    #[arg(long, env = "VIGILE_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a token and print the normalized result
    Verify {
        /// Raw bearer token
        token: String,
    },
    /// Blacklist a single token
    Blacklist {
        /// Raw bearer token
        token: String,
        /// Blacklist reason
        #[arg(long, default_value = "user_logout")]
        reason: String,
        /// User performing the action
        #[arg(long)]
        by: Option<String>,
    },
    /// Revoke every token issued to a user so far
    RevokeUser {
        /// User auth identifier
        user: String,
        /// Revocation reason
        #[arg(long, default_value = "admin_action")]
        reason: String,
        /// User performing the action
        #[arg(long)]
        by: Option<String>,
    },
    /// Show a user's active revocation time
    RevocationTime {
        /// User auth identifier
        user: String,
    },
    /// Check whether a token is blacklisted
    IsBlacklisted {
        /// Raw bearer token, or a token identifier with --identifier
        value: String,
        /// Treat the value as an already computed token identifier
        #[arg(long)]
        identifier: bool,
    },
    /// Delete expired blacklist entries and revocations
    Cleanup,
    /// Validate the configuration file
    CheckConfig,
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_verify(stack: &Stack, token: &str) -> Result<()> {
    let result = stack.handler.verify_and_unpack(token).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(normalized) = &result.token {
        let remaining = normalized.remaining_lifetime(Utc::now());
        eprintln!("Token expires in {}s", remaining.num_seconds());
    }

    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_blacklist(stack: &Stack, token: &str, reason: &str, by: Option<&str>) -> Result<()> {
    match stack.handler.revoke_token(token, reason, by).await? {
        Some(entry) => {
            println!("Token blacklisted");
            println!("  Entry:      {}", entry.entry_id);
            println!("  Identifier: {}", mask_identifier(&entry.token_identifier));
            println!("  Owner:      {}", entry.owner_auth_identifier);
            println!("  Reason:     {}", entry.reason);
            println!("  Expires:    {}", entry.expires_at.to_rfc3339());
        },
        None => println!("Token already expired, nothing to blacklist"),
    }
    Ok(())
}

async fn cmd_revoke_user(stack: &Stack, user: &str, reason: &str, by: Option<&str>) -> Result<()> {
    let outcome = stack.handler.revoke_all(user, reason, by).await?;

    println!("All tokens revoked for '{}'", outcome.revocation.owner_auth_identifier);
    println!("  Revoked at:       {}", outcome.revocation.revoked_at.to_rfc3339());
    println!("  Reason:           {}", outcome.revocation.reason);
    println!("  Active until:     {}", outcome.revocation.expires_at.to_rfc3339());
    println!("  Provider revoked: {}", outcome.provider_revoked);
    Ok(())
}

async fn cmd_revocation_time(stack: &Stack, user: &str) -> Result<()> {
    let revoked_at: Option<DateTime<Utc>> = stack.handler.get_user_token_revocation_time(user).await?;

    match revoked_at {
        Some(at) => println!("{}", at.to_rfc3339()),
        None => println!("No active revocation for '{}'", user),
    }
    Ok(())
}

async fn cmd_is_blacklisted(stack: &Stack, value: &str, identifier: bool) -> Result<()> {
    if value.is_empty() {
        bail!("Token cannot be empty");
    }

    let token_identifier = if identifier {
        value.to_string()
    } else {
        stack.handler.adapter().get_token_identifier(value)
    };

    let blacklisted = stack.handler.is_token_blacklisted(&token_identifier).await?;
    println!("{}: {}", mask_identifier(&token_identifier), blacklisted);
    Ok(())
}

async fn cmd_cleanup(stack: &Stack) -> Result<()> {
    let removed = stack.handler.cleanup_expired_entries().await?;
    println!("Removed {} expired record(s)", removed);
    Ok(())
}

fn cmd_check_config(config: &VigileConfig) -> Result<()> {
    println!("Configuration OK");
    println!("  Storage:   {:?} ({})", config.storage.backend, config.storage.data_dir.display());
    println!("  Location:  {}", config.blacklist.storage_location);
    println!("  Issuer:    {}", config.provider.issuer);
    println!("  Algorithm: {:?}", config.provider.algorithm);
    println!(
        "  Reasons:   {}",
        config
            .blacklist
            .allowed_reasons
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Retention: {} days (entries), {} days (revocations)",
        config.blacklist.cleanup_retention_days, config.blacklist.global_revocation_retention_days
    );
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn");

    let cli = Cli::parse();

    let config = VigileConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let overrides = Overrides {
        dev: cli.dev,
        jwt_secret: cli.jwt_secret,
    };
    let config = overrides.apply(config)?;

    if let Commands::CheckConfig = cli.command {
        return cmd_check_config(&config);
    }

    let stack = bootstrap(config).await?;

    match cli.command {
        Commands::Verify { token } => cmd_verify(&stack, &token).await,
        Commands::Blacklist { token, reason, by } => {
            cmd_blacklist(&stack, &token, &reason, by.as_deref()).await
        },
        Commands::RevokeUser { user, reason, by } => {
            cmd_revoke_user(&stack, &user, &reason, by.as_deref()).await
        },
        Commands::RevocationTime { user } => cmd_revocation_time(&stack, &user).await,
        Commands::IsBlacklisted { value, identifier } => {
            cmd_is_blacklisted(&stack, &value, identifier).await
        },
        Commands::Cleanup => cmd_cleanup(&stack).await,
        Commands::CheckConfig => cmd_check_config(&stack.config),
    }
}
