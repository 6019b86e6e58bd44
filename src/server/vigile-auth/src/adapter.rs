//! Identity provider adapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::claims::CustomClaimsConfig;
use crate::error::ErrorCode;
use crate::token::NormalizedToken;

/// A token decoded and verified by a provider.
pub trait DecodedToken: Send + Sync {
    /// Provider `uid` claim.
    fn uid(&self) -> Option<&str>;

    /// Standard `sub` claim.
    fn subject(&self) -> Option<&str>;

    /// Provider-specific user id claim.
    fn provider_user_id(&self) -> Option<&str>;

    /// Issue time (`None` when the token carries no `iat`).
    fn issued_at(&self) -> Option<DateTime<Utc>>;

    /// Expiry time.
    fn expires_at(&self) -> DateTime<Utc>;
}

/// Resolves the auth identifier of a decoded token.
///
/// Tries `uid`, then `sub`, then the provider user id. Blank values are
/// skipped. Returns an empty string when none is present.
pub fn resolve_auth_identifier(token: &impl DecodedToken) -> String {
    [token.uid(), token.subject(), token.provider_user_id()]
        .into_iter()
        .flatten()
        .find(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

/// Trait implemented once per identity provider.
///
/// The [`TokenHandler`](crate::TokenHandler) depends only on this trait.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider-decoded token.
    type Token: DecodedToken;

    /// Provider-specific error.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Verifies the raw token cryptographically and decodes it.
    async fn verify_token(&self, raw: &str) -> Result<Self::Token, Self::Error>;

    /// Returns a stable blacklist key for the raw token.
    ///
    /// Must not depend on the token being valid. The default is the SHA-256
    /// hex digest of the token bytes.
    fn get_token_identifier(&self, raw: &str) -> String {
        vigile_crypto::sha256_hex(raw)
    }

    /// Converts a decoded token into the normalized model. Never fails.
    fn normalize_token<C: Clone>(
        &self,
        decoded: &Self::Token,
        claims: &CustomClaimsConfig<C>,
    ) -> NormalizedToken<C>;

    /// Pushes application claims to the provider.
    async fn sync_custom_claims(
        &self,
        auth_identifier: &str,
        claims: &serde_json::Value,
    ) -> Result<(), Self::Error>;

    /// Revokes the user's tokens at the provider.
    ///
    /// Returns `false` when the provider has no native revocation.
    async fn revoke_user_tokens(&self, auth_identifier: &str) -> Result<bool, Self::Error>;

    /// Maps a provider error into the closed taxonomy.
    fn map_provider_error(&self, error: &Self::Error) -> ErrorCode;

    /// Returns the name of this provider for logging/debugging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ids {
        uid: Option<&'static str>,
        sub: Option<&'static str>,
        user_id: Option<&'static str>,
    }

    impl DecodedToken for Ids {
        fn uid(&self) -> Option<&str> {
            self.uid
        }
        fn subject(&self) -> Option<&str> {
            self.sub
        }
        fn provider_user_id(&self) -> Option<&str> {
            self.user_id
        }
        fn issued_at(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn expires_at(&self) -> DateTime<Utc> {
            DateTime::UNIX_EPOCH
        }
    }

    #[test]
    fn test_identifier_precedence() {
        let all = Ids { uid: Some("uid-1"), sub: Some("sub-1"), user_id: Some("pid-1") };
        assert_eq!(resolve_auth_identifier(&all), "uid-1");

        let no_uid = Ids { uid: None, sub: Some("sub-1"), user_id: Some("pid-1") };
        assert_eq!(resolve_auth_identifier(&no_uid), "sub-1");

        let only_provider = Ids { uid: None, sub: None, user_id: Some("pid-1") };
        assert_eq!(resolve_auth_identifier(&only_provider), "pid-1");
    }

    #[test]
    fn test_blank_claims_skipped() {
        let blank_uid = Ids { uid: Some("  "), sub: Some("sub-1"), user_id: None };
        assert_eq!(resolve_auth_identifier(&blank_uid), "sub-1");
    }

    #[test]
    fn test_empty_fallback() {
        let none = Ids { uid: None, sub: Some(""), user_id: None };
        assert_eq!(resolve_auth_identifier(&none), "");
    }
}
