//! Records persisted through the token database port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single token marked invalid before its natural expiry.
///
/// Entries are immutable once written and are removed only by cleanup
/// after `expires_at` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Unique entry identifier.
    pub entry_id: String,
    /// Stable identifier of the blacklisted token (content hash).
    pub token_identifier: String,
    /// Auth identifier of the user owning the token.
    pub owner_auth_identifier: String,
    /// When the entry was created.
    pub blacklisted_at: DateTime<Utc>,
    /// Administrator who blacklisted the token (`None` = user-initiated).
    pub blacklisted_by_user_id: Option<String>,
    /// Reason, one of the configured allowed reasons.
    pub reason: String,
    /// When the entry may be deleted by cleanup.
    pub expires_at: DateTime<Utc>,
}

impl BlacklistEntry {
    /// Returns true if the entry is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Per-user timestamp below which every previously issued token is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRevocation {
    /// Auth identifier of the affected user.
    pub owner_auth_identifier: String,
    /// Tokens issued strictly before this instant are rejected.
    pub revoked_at: DateTime<Utc>,
    /// Reason, one of the configured allowed reasons.
    pub reason: String,
    /// Administrator who triggered the revocation (`None` = user-initiated).
    pub revoked_by_user_id: Option<String>,
    /// When the revocation stops applying and may be deleted.
    pub expires_at: DateTime<Utc>,
}

impl GlobalRevocation {
    /// Returns true if the revocation is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
