//! Token verification orchestration.
//!
//! [`TokenHandler::verify_and_unpack`] runs, in order: provider verification,
//! identifier derivation, individual blacklist lookup, per-user global
//! revocation check, then normalization. Storage failures reject the token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use vigile_storage::{BlacklistEntry, GlobalRevocation};

use crate::adapter::{resolve_auth_identifier, DecodedToken, ProviderAdapter};
use crate::blacklist::BlacklistManager;
use crate::claims::CustomClaimsConfig;
use crate::error::{AuthError, ErrorCode};
use crate::mask::mask_identifier;
use crate::token::NormalizedToken;

/// Outcome of [`TokenHandler::verify_and_unpack`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult<C> {
    /// Token is usable.
    pub is_valid: bool,
    /// Token was rejected by an individual entry or a global revocation.
    pub is_blacklisted: bool,
    /// Normalized token when valid.
    pub token: Option<NormalizedToken<C>>,
    /// Rejection reason when invalid.
    pub error: Option<ErrorCode>,
}

impl<C> VerificationResult<C> {
    fn valid(token: NormalizedToken<C>) -> Self {
        Self {
            is_valid: true,
            is_blacklisted: false,
            token: Some(token),
            error: None,
        }
    }

    fn rejected(code: ErrorCode) -> Self {
        Self {
            is_valid: false,
            is_blacklisted: false,
            token: None,
            error: Some(code),
        }
    }

    fn blacklisted() -> Self {
        Self {
            is_valid: false,
            is_blacklisted: true,
            token: None,
            error: Some(ErrorCode::Blacklisted),
        }
    }

    /// Returns the normalized token, or the rejection code.
    pub fn into_result(self) -> Result<NormalizedToken<C>, ErrorCode> {
        match (self.token, self.error) {
            (Some(token), None) if self.is_valid => Ok(token),
            (_, error) => Err(error.unwrap_or(ErrorCode::Unknown)),
        }
    }
}

/// Result of [`TokenHandler::revoke_all`].
#[derive(Debug, Clone)]
pub struct RevocationOutcome {
    /// The stored global revocation.
    pub revocation: GlobalRevocation,
    /// Whether the provider also revoked the tokens natively.
    pub provider_revoked: bool,
}

/// Whether a token issued at `issued_at` falls under a revocation at `revoked_at`.
///
/// Tokens without an issue time are treated as issued before any revocation.
fn is_revoked(issued_at: Option<DateTime<Utc>>, revoked_at: DateTime<Utc>) -> bool {
    match issued_at {
        Some(issued_at) => issued_at < revoked_at,
        None => true,
    }
}

/// Verifies and unpacks bearer tokens.
///
/// Generic over the provider adapter `A` and the application claims type `C`.
/// Construct once at startup and share behind an `Arc`.
pub struct TokenHandler<A, C> {
    adapter: Arc<A>,
    blacklist: Arc<BlacklistManager>,
    claims: CustomClaimsConfig<C>,
}

impl<A, C> TokenHandler<A, C>
where
    A: ProviderAdapter,
    C: Clone + Send + Sync,
{
    /// Creates a new token handler.
    pub fn new(adapter: Arc<A>, blacklist: Arc<BlacklistManager>, claims: CustomClaimsConfig<C>) -> Self {
        Self {
            adapter,
            blacklist,
            claims,
        }
    }

    /// Returns the provider adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the shared blacklist manager.
    pub fn blacklist(&self) -> &Arc<BlacklistManager> {
        &self.blacklist
    }

    /// Verifies a raw bearer token and returns its normalized form.
    ///
    /// Never fails: every problem is reported through the result.
    pub async fn verify_and_unpack(&self, raw: &str) -> VerificationResult<C> {
        let decoded = match self.adapter.verify_token(raw).await {
            Ok(decoded) => decoded,
            Err(e) => {
                let code = self.adapter.map_provider_error(&e);
                debug!(provider = self.adapter.name(), error = %code, "Token rejected by provider");
                return VerificationResult::rejected(code);
            },
        };

        let token_identifier = self.adapter.get_token_identifier(raw);

        match self.blacklist.is_blacklisted(&token_identifier).await {
            Ok(false) => {},
            Ok(true) => {
                info!(token = %mask_identifier(&token_identifier), "Blacklisted token presented");
                return VerificationResult::blacklisted();
            },
            Err(e) => {
                error!(
                    token = %mask_identifier(&token_identifier),
                    error = %e,
                    "Blacklist lookup failed, rejecting token"
                );
                return VerificationResult::rejected(ErrorCode::Unknown);
            },
        }

        let auth_identifier = resolve_auth_identifier(&decoded);
        if auth_identifier.is_empty() {
            warn!(
                token = %mask_identifier(&token_identifier),
                "Verified token carries no user identifier"
            );
            return VerificationResult::rejected(ErrorCode::Malformed);
        }

        match self.blacklist.get_user_token_revocation_time(&auth_identifier).await {
            Ok(Some(revoked_at)) if is_revoked(decoded.issued_at(), revoked_at) => {
                info!(
                    user = %auth_identifier,
                    revoked_at = %revoked_at,
                    "Token issued before global revocation"
                );
                return VerificationResult::blacklisted();
            },
            Ok(_) => {},
            Err(e) => {
                error!(user = %auth_identifier, error = %e, "Revocation lookup failed, rejecting token");
                return VerificationResult::rejected(ErrorCode::Unknown);
            },
        }

        VerificationResult::valid(self.adapter.normalize_token(&decoded, &self.claims))
    }

    /// Pushes application claims for a user to the provider.
    pub async fn sync_custom_claims<T>(&self, auth_identifier: &str, claims: &T) -> Result<(), AuthError>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(claims).map_err(|e| AuthError::InvalidClaims(e.to_string()))?;

        self.adapter
            .sync_custom_claims(auth_identifier, &value)
            .await
            .map_err(|e| self.provider_error(e))
    }

    /// Asks the provider to revoke a user's tokens natively.
    ///
    /// Returns `false` when the provider has no native revocation.
    pub async fn revoke_user_tokens(&self, auth_identifier: &str) -> Result<bool, AuthError> {
        self.adapter
            .revoke_user_tokens(auth_identifier)
            .await
            .map_err(|e| self.provider_error(e))
    }

    /// Revokes all of a user's tokens: global revocation first, then the
    /// provider's native revocation on a best-effort basis.
    pub async fn revoke_all(
        &self,
        auth_identifier: &str,
        reason: &str,
        revoked_by: Option<&str>,
    ) -> Result<RevocationOutcome, AuthError> {
        let revocation = self
            .blacklist
            .blacklist_all_user_tokens(auth_identifier, reason, revoked_by)
            .await?;

        let provider_revoked = match self.adapter.revoke_user_tokens(auth_identifier).await {
            Ok(revoked) => revoked,
            Err(e) => {
                warn!(
                    provider = self.adapter.name(),
                    user = %auth_identifier,
                    error = %self.adapter.map_provider_error(&e),
                    "Provider revocation failed, global revocation still applies"
                );
                false
            },
        };

        Ok(RevocationOutcome {
            revocation,
            provider_revoked,
        })
    }

    /// Blacklists a presented raw token (single-session logout).
    ///
    /// Returns `Ok(None)` for an already expired token, which needs no entry.
    pub async fn revoke_token(
        &self,
        raw: &str,
        reason: &str,
        blacklisted_by: Option<&str>,
    ) -> Result<Option<BlacklistEntry>, AuthError> {
        self.blacklist.validate_reason(reason)?;

        let decoded = match self.adapter.verify_token(raw).await {
            Ok(decoded) => decoded,
            Err(e) => {
                let code = self.adapter.map_provider_error(&e);
                if code == ErrorCode::Expired {
                    debug!("Token already expired, no blacklist entry needed");
                    return Ok(None);
                }
                return Err(AuthError::Provider {
                    code,
                    message: e.to_string(),
                });
            },
        };

        let owner = resolve_auth_identifier(&decoded);
        let token_identifier = self.adapter.get_token_identifier(raw);

        let entry = self
            .blacklist
            .blacklist_token(
                &token_identifier,
                &owner,
                reason,
                decoded.expires_at(),
                blacklisted_by,
            )
            .await?;

        Ok(Some(entry))
    }

    /// Blacklists a token by identifier.
    pub async fn blacklist_token(
        &self,
        token_identifier: &str,
        owner_auth_identifier: &str,
        reason: &str,
        token_expires_at: DateTime<Utc>,
        blacklisted_by: Option<&str>,
    ) -> Result<BlacklistEntry, AuthError> {
        self.blacklist
            .blacklist_token(
                token_identifier,
                owner_auth_identifier,
                reason,
                token_expires_at,
                blacklisted_by,
            )
            .await
    }

    /// Writes a global revocation for a user.
    pub async fn blacklist_all_user_tokens(
        &self,
        owner_auth_identifier: &str,
        reason: &str,
        revoked_by: Option<&str>,
    ) -> Result<GlobalRevocation, AuthError> {
        self.blacklist
            .blacklist_all_user_tokens(owner_auth_identifier, reason, revoked_by)
            .await
    }

    /// Checks whether a token identifier is blacklisted.
    pub async fn is_token_blacklisted(&self, token_identifier: &str) -> Result<bool, AuthError> {
        Ok(self.blacklist.is_blacklisted(token_identifier).await?)
    }

    /// Returns the active revocation timestamp for a user.
    pub async fn get_user_token_revocation_time(
        &self,
        owner_auth_identifier: &str,
    ) -> Result<Option<DateTime<Utc>>, AuthError> {
        Ok(self
            .blacklist
            .get_user_token_revocation_time(owner_auth_identifier)
            .await?)
    }

    /// Deletes expired blacklist records.
    pub async fn cleanup_expired_entries(&self) -> Result<u64, AuthError> {
        Ok(self.blacklist.cleanup_expired_entries().await?)
    }

    fn provider_error(&self, e: A::Error) -> AuthError {
        AuthError::Provider {
            code: self.adapter.map_provider_error(&e),
            message: e.to_string(),
        }
    }
}
