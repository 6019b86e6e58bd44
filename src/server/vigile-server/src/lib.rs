//! # Vigile Server
//!
//! Wires configuration, storage and the identity provider into a
//! ready-to-use [`Stack`]. Shared by the server binary and the CLI.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigile_auth::{
    BlacklistManager, CleanupService, CustomClaimsConfig, IdentityProvider, StorageConfig,
    StorageKind, TokenHandler, VigileConfig,
};
use vigile_storage::{MemoryTokenDatabase, TokenDatabase};
use vigile_storage_sqlite::SqliteTokenDatabase;

/// Token handler used by the Vigile binaries: identity provider tokens
/// carrying a JSON custom claims object.
pub type VigileHandler = TokenHandler<IdentityProvider, Value>;

/// Command line overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Development mode: in-memory storage.
    pub dev: bool,
    /// Replaces `provider.jwt_secret`.
    pub jwt_secret: Option<String>,
}

impl Overrides {
    /// Applies the overrides and re-validates the configuration.
    pub fn apply(&self, mut config: VigileConfig) -> Result<VigileConfig> {
        if self.dev {
            warn!("Development mode enabled - blacklist data is kept in memory only");
            config.storage.backend = StorageKind::Memory;
        }
        if let Some(secret) = &self.jwt_secret {
            config.provider.jwt_secret = Some(secret.clone());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Fully wired Vigile components.
pub struct Stack {
    /// Effective configuration.
    pub config: VigileConfig,
    /// Blacklist storage.
    pub database: Arc<dyn TokenDatabase>,
    /// Token handler.
    pub handler: Arc<VigileHandler>,
}

impl Stack {
    /// Builds the cleanup service, if enabled.
    pub fn cleanup_service(&self) -> Option<CleanupService> {
        self.config.cleanup.enabled.then(|| {
            CleanupService::new(
                Arc::clone(self.handler.blacklist()),
                Duration::from_secs(self.config.cleanup.interval_secs),
            )
        })
    }
}

/// Opens the configured storage backend.
pub async fn open_database(storage: &StorageConfig, location: &str) -> Result<Arc<dyn TokenDatabase>> {
    match storage.backend {
        StorageKind::Memory => Ok(Arc::new(MemoryTokenDatabase::new())),
        StorageKind::Sqlite => {
            let db = SqliteTokenDatabase::open(&storage.data_dir, location)
                .await
                .with_context(|| {
                    format!("Failed to open blacklist database in {}", storage.data_dir.display())
                })?;
            info!(path = %db.path().display(), "Opened SQLite blacklist database");
            Ok(Arc::new(db))
        },
    }
}

/// Builds every component from a validated configuration.
pub async fn bootstrap(config: VigileConfig) -> Result<Stack> {
    let database = open_database(&config.storage, &config.blacklist.storage_location).await?;

    let blacklist = Arc::new(
        BlacklistManager::new(Arc::clone(&database), config.blacklist.clone())
            .context("Invalid blacklist configuration")?,
    );

    let provider = IdentityProvider::new(config.provider.clone())
        .context("Failed to initialize identity provider")?;

    let claims = CustomClaimsConfig::from_namespace(
        config.claims.namespace.clone(),
        Value::Object(Default::default()),
    );

    let handler = Arc::new(TokenHandler::new(
        Arc::new(provider),
        blacklist,
        claims,
    ));

    info!(
        storage = database.name(),
        issuer = %config.provider.issuer,
        reasons = handler.blacklist().config().allowed_reasons.len(),
        "Vigile stack ready"
    );

    Ok(Stack {
        config,
        database,
        handler,
    })
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}
