//! Vigile configuration file.
//!
//! Loaded once at startup from TOML; every component receives an immutable
//! copy of its section.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blacklist::BlacklistConfig;
use crate::identity::IdentityProviderConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// File is not valid TOML or does not match the schema.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Values are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// SQLite file under `data_dir`.
    #[default]
    Sqlite,
    /// Process memory (development only).
    Memory,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: StorageKind,

    /// Directory holding database files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// `[cleanup]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Run the cleanup service.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between cleanup cycles.
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

/// `[claims]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsConfig {
    /// Claim holding the application's custom claims object.
    #[serde(default = "default_claims_namespace")]
    pub namespace: String,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            namespace: default_claims_namespace(),
        }
    }
}

fn default_claims_namespace() -> String {
    "app".to_string()
}

/// Complete Vigile configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigileConfig {
    /// Storage backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Blacklist reasons and retention.
    #[serde(default)]
    pub blacklist: BlacklistConfig,

    /// Identity provider.
    pub provider: IdentityProviderConfig,

    /// Custom claims resolution.
    #[serde(default)]
    pub claims: ClaimsConfig,

    /// Scheduled cleanup.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl VigileConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.blacklist
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.provider.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.issuer cannot be empty".into()));
        }
        if self.provider.jwt_secret.is_none() && self.provider.public_key_pem.is_none() {
            return Err(ConfigError::Invalid(
                "provider needs jwt_secret or public_key_pem".into(),
            ));
        }
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cleanup.interval_secs must be greater than zero".into(),
            ));
        }
        if self.claims.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("claims.namespace cannot be empty".into()));
        }

        Ok(())
    }
}
