//! Token blacklist and per-user global revocation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vigile_storage::{BlacklistEntry, GlobalRevocation, StorageError, TokenDatabase};

use crate::error::AuthError;
use crate::mask::mask_identifier;

/// Length in bytes of generated entry ids (hex doubles it).
const ENTRY_ID_BYTES: usize = 16;

/// Blacklist configuration. Immutable once the manager is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistConfig {
    /// Closed set of accepted reasons.
    #[serde(default = "default_allowed_reasons")]
    pub allowed_reasons: BTreeSet<String>,

    /// Days a blacklist entry is kept after the token's own expiry.
    #[serde(default = "default_cleanup_retention_days")]
    pub cleanup_retention_days: u32,

    /// Days a global revocation stays active.
    #[serde(default = "default_global_revocation_retention_days")]
    pub global_revocation_retention_days: u32,

    /// Storage location (database name) for blacklist data.
    #[serde(default = "default_storage_location")]
    pub storage_location: String,
}

fn default_allowed_reasons() -> BTreeSet<String> {
    [
        "user_logout",
        "password_change",
        "account_deletion",
        "admin_action",
        "security_breach",
        "token_compromised",
        "suspicious_activity",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_cleanup_retention_days() -> u32 {
    30
}

fn default_global_revocation_retention_days() -> u32 {
    30
}

fn default_storage_location() -> String {
    "token-blacklist".to_string()
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            allowed_reasons: default_allowed_reasons(),
            cleanup_retention_days: default_cleanup_retention_days(),
            global_revocation_retention_days: default_global_revocation_retention_days(),
            storage_location: default_storage_location(),
        }
    }
}

impl BlacklistConfig {
    /// Checks the configuration for obvious mistakes.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.allowed_reasons.is_empty() {
            return Err(AuthError::Configuration(
                "allowed_reasons cannot be empty".into(),
            ));
        }
        if self.allowed_reasons.iter().any(|r| r.trim().is_empty()) {
            return Err(AuthError::Configuration(
                "allowed_reasons cannot contain blank reasons".into(),
            ));
        }
        if self.storage_location.trim().is_empty() {
            return Err(AuthError::Configuration(
                "storage_location cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Returns true if `reason` is in the configured set.
    pub fn is_allowed(&self, reason: &str) -> bool {
        self.allowed_reasons.contains(reason)
    }
}

/// Adds `days` to `at`, saturating at the maximum representable instant.
fn add_days(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    at.checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Manages blacklist entries and global revocations.
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct BlacklistManager {
    db: Arc<dyn TokenDatabase>,
    config: BlacklistConfig,
}

impl BlacklistManager {
    /// Creates a manager over the given database.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the configuration is invalid.
    pub fn new(db: Arc<dyn TokenDatabase>, config: BlacklistConfig) -> Result<Self, AuthError> {
        config.validate()?;

        debug!(
            backend = db.name(),
            reasons = config.allowed_reasons.len(),
            "Blacklist manager initialized"
        );

        Ok(Self { db, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BlacklistConfig {
        &self.config
    }

    /// Rejects reasons outside the configured set. Performs no I/O.
    pub fn validate_reason(&self, reason: &str) -> Result<(), AuthError> {
        if self.config.is_allowed(reason) {
            Ok(())
        } else {
            warn!(reason = %reason, "Rejected unconfigured blacklist reason");
            Err(AuthError::InvalidReason {
                reason: reason.to_string(),
            })
        }
    }

    /// Blacklists a single token.
    ///
    /// The entry expires `cleanup_retention_days` after the token itself.
    ///
    /// # Arguments
    ///
    /// * `token_identifier` - Stable token identifier from the provider adapter
    /// * `owner_auth_identifier` - User owning the token
    /// * `reason` - One of the configured reasons
    /// * `token_expires_at` - Natural expiry of the token
    /// * `blacklisted_by` - Administrator id, `None` when user-initiated
    pub async fn blacklist_token(
        &self,
        token_identifier: &str,
        owner_auth_identifier: &str,
        reason: &str,
        token_expires_at: DateTime<Utc>,
        blacklisted_by: Option<&str>,
    ) -> Result<BlacklistEntry, AuthError> {
        self.validate_reason(reason)?;
        if token_identifier.is_empty() {
            return Err(AuthError::InvalidIdentifier);
        }
        if owner_auth_identifier.is_empty() {
            return Err(AuthError::InvalidOwner);
        }

        let entry = BlacklistEntry {
            entry_id: vigile_crypto::generate_token(ENTRY_ID_BYTES),
            token_identifier: token_identifier.to_string(),
            owner_auth_identifier: owner_auth_identifier.to_string(),
            blacklisted_at: Utc::now(),
            blacklisted_by_user_id: blacklisted_by.map(str::to_string),
            reason: reason.to_string(),
            expires_at: add_days(token_expires_at, self.config.cleanup_retention_days),
        };

        self.db.add_blacklist_entry(&entry).await?;

        info!(
            token = %mask_identifier(token_identifier),
            owner = %owner_auth_identifier,
            reason = %reason,
            admin = blacklisted_by.is_some(),
            "Token blacklisted"
        );

        Ok(entry)
    }

    /// Checks whether a token identifier is blacklisted.
    pub async fn is_blacklisted(&self, token_identifier: &str) -> Result<bool, StorageError> {
        let blacklisted = self.db.is_token_blacklisted(token_identifier).await?;

        debug!(
            token = %mask_identifier(token_identifier),
            blacklisted = blacklisted,
            "Blacklist lookup"
        );

        Ok(blacklisted)
    }

    /// Revokes every token issued to a user before now.
    ///
    /// Replaces any earlier revocation for the same user. The revocation time
    /// is truncated to whole seconds, so a token issued earlier within the
    /// same second stays valid.
    pub async fn blacklist_all_user_tokens(
        &self,
        owner_auth_identifier: &str,
        reason: &str,
        revoked_by: Option<&str>,
    ) -> Result<GlobalRevocation, AuthError> {
        self.validate_reason(reason)?;
        if owner_auth_identifier.is_empty() {
            return Err(AuthError::InvalidOwner);
        }

        // Token `iat` has second resolution.
        let revoked_at = Utc::now().trunc_subsecs(0);

        let revocation = GlobalRevocation {
            owner_auth_identifier: owner_auth_identifier.to_string(),
            revoked_at,
            reason: reason.to_string(),
            revoked_by_user_id: revoked_by.map(str::to_string),
            expires_at: add_days(revoked_at, self.config.global_revocation_retention_days),
        };

        self.db.add_user_revocation(&revocation).await?;

        warn!(
            owner = %owner_auth_identifier,
            reason = %reason,
            revoked_at = %revoked_at,
            "All tokens revoked for user"
        );

        Ok(revocation)
    }

    /// Returns the active revocation timestamp for a user.
    ///
    /// An empty owner never has a revocation and is answered without I/O.
    pub async fn get_user_token_revocation_time(
        &self,
        owner_auth_identifier: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        if owner_auth_identifier.is_empty() {
            return Ok(None);
        }

        self.db
            .get_user_revocation_time(owner_auth_identifier, Utc::now())
            .await
    }

    /// Deletes expired entries and revocations. Returns the number deleted.
    pub async fn cleanup_expired_entries(&self) -> Result<u64, StorageError> {
        let removed = self.db.cleanup_expired_entries(Utc::now()).await?;

        if removed > 0 {
            info!(removed = removed, "Expired blacklist records cleaned up");
        } else {
            debug!("No expired blacklist records");
        }

        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use vigile_storage::MemoryTokenDatabase;

    fn setup() -> (Arc<MemoryTokenDatabase>, BlacklistManager) {
        let db = Arc::new(MemoryTokenDatabase::new());
        let manager = BlacklistManager::new(db.clone(), BlacklistConfig::default()).unwrap();
        (db, manager)
    }

    #[test]
    fn test_config_is_kept() {
        let db = Arc::new(MemoryTokenDatabase::new());
        let config = BlacklistConfig {
            allowed_reasons: ["admin_action".to_string()].into(),
            cleanup_retention_days: 3,
            ..BlacklistConfig::default()
        };
        let manager = BlacklistManager::new(db, config.clone()).unwrap();

        assert_eq!(manager.config(), &config);
        assert!(manager.validate_reason("admin_action").is_ok());
        assert!(manager.validate_reason("user_logout").is_err());
    }

    #[tokio::test]
    async fn test_blacklist_token_creates_entry() {
        let (db, manager) = setup();
        let token_exp = Utc::now() + Duration::hours(1);

        let entry = manager
            .blacklist_token("abc123def456", "user-1", "user_logout", token_exp, None)
            .await
            .unwrap();

        assert_eq!(entry.token_identifier, "abc123def456");
        assert_eq!(entry.owner_auth_identifier, "user-1");
        assert_eq!(entry.reason, "user_logout");
        assert_eq!(entry.blacklisted_by_user_id, None);
        assert_eq!(entry.entry_id.len(), ENTRY_ID_BYTES * 2);
        assert_eq!(entry.expires_at, token_exp + Duration::days(30));
        assert!(manager.is_blacklisted("abc123def456").await.unwrap());
        assert_eq!(db.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_entry_ids_unique() {
        let (_db, manager) = setup();
        let exp = Utc::now() + Duration::hours(1);

        let a = manager.blacklist_token("tok", "u", "user_logout", exp, None).await.unwrap();
        let b = manager
            .blacklist_token("tok", "u", "admin_action", exp, Some("admin-1"))
            .await
            .unwrap();

        assert_ne!(a.entry_id, b.entry_id);
        assert_eq!(b.blacklisted_by_user_id.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn test_invalid_reason_rejected_without_writes() {
        let (db, manager) = setup();

        let result = manager
            .blacklist_token("abc123", "user-1", "not_a_real_reason", Utc::now(), None)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidReason { ref reason }) if reason == "not_a_real_reason"));

        let result = manager
            .blacklist_all_user_tokens("user-1", "not_a_real_reason", None)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidReason { .. })));

        assert!(!manager.is_blacklisted("abc123").await.unwrap());
        assert_eq!(db.entry_count().await, 0);
        assert_eq!(db.revocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_reason_is_not_coerced() {
        let (_db, manager) = setup();

        for reason in ["USER_LOGOUT", " user_logout", "user_logout ", ""] {
            assert!(
                manager.validate_reason(reason).is_err(),
                "should reject reason: {reason:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_empty_identifiers_rejected() {
        let (db, manager) = setup();
        let exp = Utc::now();

        assert!(matches!(
            manager.blacklist_token("", "u", "user_logout", exp, None).await,
            Err(AuthError::InvalidIdentifier)
        ));
        assert!(matches!(
            manager.blacklist_token("tok", "", "user_logout", exp, None).await,
            Err(AuthError::InvalidOwner)
        ));
        assert!(matches!(
            manager.blacklist_all_user_tokens("", "user_logout", None).await,
            Err(AuthError::InvalidOwner)
        ));
        assert_eq!(db.entry_count().await, 0);
        assert_eq!(db.revocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_global_revocation() {
        let (db, manager) = setup();
        let before = Utc::now().trunc_subsecs(0);

        let revocation = manager
            .blacklist_all_user_tokens("user-1", "password_change", None)
            .await
            .unwrap();

        assert!(revocation.revoked_at >= before);
        assert_eq!(revocation.revoked_at.timestamp_subsec_nanos(), 0);
        assert_eq!(revocation.expires_at, revocation.revoked_at + Duration::days(30));
        assert_eq!(
            manager.get_user_token_revocation_time("user-1").await.unwrap(),
            Some(revocation.revoked_at)
        );
        assert_eq!(manager.get_user_token_revocation_time("user-2").await.unwrap(), None);

        // A second revocation replaces, not appends
        manager
            .blacklist_all_user_tokens("user-1", "admin_action", Some("admin-1"))
            .await
            .unwrap();
        assert_eq!(db.revocation_count().await, 1);
        assert_eq!(
            db.revocation("user-1").await.map(|r| r.reason),
            Some("admin_action".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_owner_has_no_revocation() {
        let (db, manager) = setup();

        // Seed a record under the empty key directly; it must never be returned.
        db.add_user_revocation(&GlobalRevocation {
            owner_auth_identifier: String::new(),
            revoked_at: Utc::now(),
            reason: "admin_action".into(),
            revoked_by_user_id: None,
            expires_at: Utc::now() + Duration::days(1),
        })
        .await
        .unwrap();

        assert_eq!(manager.get_user_token_revocation_time("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup_respects_expiry() {
        let db = Arc::new(MemoryTokenDatabase::new());
        let config = BlacklistConfig {
            cleanup_retention_days: 0,
            ..BlacklistConfig::default()
        };
        let manager = BlacklistManager::new(db.clone(), config).unwrap();

        manager
            .blacklist_token("expired-tok", "u", "user_logout", Utc::now() - Duration::hours(2), None)
            .await
            .unwrap();
        manager
            .blacklist_token("live-tok", "u", "user_logout", Utc::now() + Duration::hours(2), None)
            .await
            .unwrap();

        assert_eq!(manager.cleanup_expired_entries().await.unwrap(), 1);
        assert_eq!(manager.cleanup_expired_entries().await.unwrap(), 0);
        assert!(!manager.is_blacklisted("expired-tok").await.unwrap());
        assert!(manager.is_blacklisted("live-tok").await.unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let db = Arc::new(MemoryTokenDatabase::new());

        let empty = BlacklistConfig {
            allowed_reasons: BTreeSet::new(),
            ..BlacklistConfig::default()
        };
        assert!(matches!(
            BlacklistManager::new(db.clone(), empty),
            Err(AuthError::Configuration(_))
        ));

        let blank = BlacklistConfig {
            allowed_reasons: ["user_logout".to_string(), "  ".to_string()].into(),
            ..BlacklistConfig::default()
        };
        assert!(BlacklistManager::new(db, blank).is_err());
    }

    #[test]
    fn test_add_days_saturates() {
        assert_eq!(add_days(DateTime::<Utc>::MAX_UTC, 30), DateTime::<Utc>::MAX_UTC);
    }
}
