//! Normalized token model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider-agnostic representation of a verified token.
///
/// `C` is the application's custom claims type, resolved through a
/// [`CustomClaimsConfig`](crate::CustomClaimsConfig).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedToken<C> {
    /// Stable identity of the user at the provider (`uid`, `sub`, ...).
    pub auth_identifier: String,

    /// Application-side user id, when the provider carries one.
    pub application_user_id: Option<String>,

    /// Email address.
    pub email: Option<String>,

    /// Whether the provider verified the email address.
    pub email_verified: bool,

    /// Phone number.
    pub phone_number: Option<String>,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,

    /// When the token expires.
    pub expires_at: DateTime<Utc>,

    /// Token issuer.
    pub issuer: String,

    /// Application-defined claims.
    pub custom_claims: C,

    /// Every claim as decoded. Diagnostics only.
    pub raw_claims: Map<String, Value>,
}

impl<C> NormalizedToken<C> {
    /// Returns true if the token is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Remaining lifetime at `now`, zero once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}
