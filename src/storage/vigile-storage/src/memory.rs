//! In-memory token database.
//!
//! Used in development mode and by tests. Data is lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::database::TokenDatabase;
use crate::error::StorageError;
use crate::records::{BlacklistEntry, GlobalRevocation};

/// Token database backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryTokenDatabase {
    /// Entries grouped by token identifier.
    entries: RwLock<HashMap<String, Vec<BlacklistEntry>>>,
    /// One revocation per owner.
    revocations: RwLock<HashMap<String, GlobalRevocation>>,
}

impl MemoryTokenDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blacklist entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    /// Returns the number of stored global revocations.
    pub async fn revocation_count(&self) -> usize {
        self.revocations.read().await.len()
    }

    /// Returns the stored revocation for a user, expired or not.
    pub async fn revocation(&self, owner_auth_identifier: &str) -> Option<GlobalRevocation> {
        self.revocations
            .read()
            .await
            .get(owner_auth_identifier)
            .cloned()
    }
}

#[async_trait]
impl TokenDatabase for MemoryTokenDatabase {
    async fn add_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        let bucket = entries.entry(entry.token_identifier.clone()).or_default();

        if bucket.iter().any(|e| e.entry_id == entry.entry_id) {
            return Err(StorageError::AlreadyExists(entry.entry_id.clone()));
        }

        bucket.push(entry.clone());
        Ok(())
    }

    async fn is_token_blacklisted(&self, token_identifier: &str) -> Result<bool, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .get(token_identifier)
            .is_some_and(|bucket| !bucket.is_empty()))
    }

    async fn add_user_revocation(&self, revocation: &GlobalRevocation) -> Result<(), StorageError> {
        let mut revocations = self.revocations.write().await;

        match revocations.get(&revocation.owner_auth_identifier) {
            Some(existing) if existing.revoked_at > revocation.revoked_at => {
                // A newer revocation is already in place.
            },
            _ => {
                revocations.insert(revocation.owner_auth_identifier.clone(), revocation.clone());
            },
        }

        Ok(())
    }

    async fn get_user_revocation_time(
        &self,
        owner_auth_identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self
            .revocations
            .read()
            .await
            .get(owner_auth_identifier)
            .filter(|r| !r.is_expired_at(now))
            .map(|r| r.revoked_at))
    }

    async fn cleanup_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut removed = 0u64;

        {
            let mut entries = self.entries.write().await;
            for bucket in entries.values_mut() {
                let before = bucket.len();
                bucket.retain(|e| !e.is_expired_at(now));
                removed += (before - bucket.len()) as u64;
            }
            entries.retain(|_, bucket| !bucket.is_empty());
        }

        {
            let mut revocations = self.revocations.write().await;
            let before = revocations.len();
            revocations.retain(|_, r| !r.is_expired_at(now));
            removed += (before - revocations.len()) as u64;
        }

        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
