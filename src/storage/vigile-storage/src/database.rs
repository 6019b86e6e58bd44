//! Token database port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::records::{BlacklistEntry, GlobalRevocation};

/// Storage port for blacklist entries and global revocations.
///
/// Implementations must write each record atomically and provide
/// read-after-write consistency within one process. Retry policy, if any,
/// belongs to the implementation.
#[async_trait]
pub trait TokenDatabase: Send + Sync {
    /// Persists a new blacklist entry.
    async fn add_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StorageError>;

    /// Checks whether an entry exists for the given token identifier.
    async fn is_token_blacklisted(&self, token_identifier: &str) -> Result<bool, StorageError>;

    /// Stores a global revocation, replacing any previous one for the same user.
    async fn add_user_revocation(&self, revocation: &GlobalRevocation) -> Result<(), StorageError>;

    /// Returns the active revocation timestamp for a user.
    ///
    /// Revocations whose `expires_at` lies before `now` are ignored.
    async fn get_user_revocation_time(
        &self,
        owner_auth_identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Deletes entries and revocations with `expires_at` strictly before `now`.
    ///
    /// Returns the number of deleted records. Must be idempotent.
    async fn cleanup_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}
