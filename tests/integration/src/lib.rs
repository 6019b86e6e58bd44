//! Integration tests for Vigile.
//!
//! These tests run the complete stack in-process: configuration, SQLite
//! storage, the identity provider adapter and the token handler.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use vigile_auth::{StorageKind, VigileConfig};
use vigile_server::{bootstrap, Stack};

pub const ISSUER: &str = "https://id.example.com";
pub const SECRET: &str = "integration-secret-key-minimum-32!";

// ============================================================================
// Test Stack
// ============================================================================

/// A Vigile stack backed by SQLite in its own data directory.
pub struct TestStack {
    pub stack: Stack,
    data_dir: TempDir,
}

impl TestStack {
    /// Starts a stack in a fresh data directory.
    pub async fn start() -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let stack = bootstrap(config_for(&data_dir)?).await?;
        Ok(Self { stack, data_dir })
    }

    /// Builds a second stack over the same data directory, as another
    /// process sharing the blacklist storage would.
    pub async fn sibling(&self) -> Result<Stack> {
        bootstrap(config_for(&self.data_dir)?).await
    }
}

fn config_for(data_dir: &TempDir) -> Result<VigileConfig> {
    let mut config = VigileConfig::from_toml_str(&format!(
        r#"
        [provider]
        issuer = "{ISSUER}"
        jwt_secret = "{SECRET}"

        [claims]
        namespace = "app"
        "#
    ))?;
    config.storage.backend = StorageKind::Sqlite;
    config.storage.data_dir = data_dir.path().to_path_buf();
    Ok(config)
}

// ============================================================================
// Token Minting
// ============================================================================

/// Signs `claims` with the shared test secret.
pub fn sign(claims: &Value) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

/// Mints a token for `uid` issued at `issued_at`, valid for one hour.
pub fn mint(uid: &str, issued_at: DateTime<Utc>) -> String {
    sign(&json!({
        "iss": ISSUER,
        "uid": uid,
        "sub": format!("sub-{uid}"),
        "email": format!("{uid}@example.com"),
        "email_verified": true,
        "app_user_id": 42,
        "iat": issued_at.timestamp(),
        "exp": (issued_at + Duration::hours(1)).timestamp(),
        "app": { "role": "admin" },
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vigile_auth::{AuthError, ErrorCode, ProviderAdapter};
    use vigile_storage::{BlacklistEntry, GlobalRevocation, TokenDatabase};

    #[tokio::test]
    async fn test_valid_token_is_normalized() {
        let test = TestStack::start().await.unwrap();
        let token = mint("user-1", Utc::now());

        let result = test.stack.handler.verify_and_unpack(&token).await;

        assert!(result.is_valid);
        assert!(!result.is_blacklisted);
        let normalized = result.into_result().unwrap();
        assert_eq!(normalized.auth_identifier, "user-1");
        assert_eq!(normalized.application_user_id.as_deref(), Some("42"));
        assert_eq!(normalized.email.as_deref(), Some("user-1@example.com"));
        assert!(normalized.email_verified);
        assert_eq!(normalized.issuer, ISSUER);
        assert_eq!(normalized.custom_claims, json!({ "role": "admin" }));
    }

    #[tokio::test]
    async fn test_logout_all_rejects_older_tokens_only() {
        let test = TestStack::start().await.unwrap();
        let handler = &test.stack.handler;

        let token_a = mint("user-1", Utc::now() - Duration::seconds(30));
        assert!(handler.verify_and_unpack(&token_a).await.is_valid);

        let outcome = handler.revoke_all("user-1", "user_logout", None).await.unwrap();
        assert!(!outcome.provider_revoked);

        let result = handler.verify_and_unpack(&token_a).await;
        assert!(!result.is_valid);
        assert!(result.is_blacklisted);
        assert_eq!(result.error, Some(ErrorCode::Blacklisted));

        let token_b = mint("user-1", outcome.revocation.revoked_at + Duration::seconds(1));
        assert!(handler.verify_and_unpack(&token_b).await.is_valid);

        // Other users are unaffected.
        let other = mint("user-2", Utc::now() - Duration::seconds(30));
        assert!(handler.verify_and_unpack(&other).await.is_valid);
    }

    #[tokio::test]
    async fn test_invalid_reason_writes_nothing() {
        let test = TestStack::start().await.unwrap();
        let handler = &test.stack.handler;

        let err = handler
            .blacklist_token(
                "abc123",
                "user-1",
                "not_a_real_reason",
                Utc::now() + Duration::hours(1),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidReason { .. }));
        assert!(!handler.is_token_blacklisted("abc123").await.unwrap());

        let err = handler
            .blacklist_all_user_tokens("user-1", "not_a_real_reason", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidReason { .. }));
        assert!(handler
            .get_user_token_revocation_time("user-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_signature_error_is_mapped() {
        let test = TestStack::start().await.unwrap();
        let adapter = test.stack.handler.adapter();

        let forged = encode(
            &Header::default(),
            &json!({
                "iss": ISSUER,
                "uid": "user-1",
                "iat": Utc::now().timestamp(),
                "exp": (Utc::now() + Duration::hours(1)).timestamp(),
            }),
            &EncodingKey::from_secret(b"some-other-secret-entirely-32-chars"),
        )
        .unwrap();

        let err = adapter.verify_token(&forged).await.unwrap_err();
        assert_eq!(adapter.map_provider_error(&err), ErrorCode::InvalidSignature);

        let result = test.stack.handler.verify_and_unpack(&forged).await;
        assert_eq!(result.error, Some(ErrorCode::InvalidSignature));
        assert!(!result.is_blacklisted);
    }

    #[tokio::test]
    async fn test_single_token_logout() {
        let test = TestStack::start().await.unwrap();
        let handler = &test.stack.handler;

        let token = mint("user-1", Utc::now());
        let other_session = mint("user-2", Utc::now());

        let entry = handler
            .revoke_token(&token, "user_logout", Some("user-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.owner_auth_identifier, "user-1");
        assert_eq!(entry.token_identifier, handler.adapter().get_token_identifier(&token));

        let result = handler.verify_and_unpack(&token).await;
        assert!(result.is_blacklisted);
        assert_eq!(result.error, Some(ErrorCode::Blacklisted));

        assert!(handler.verify_and_unpack(&other_session).await.is_valid);
    }

    #[tokio::test]
    async fn test_revocations_shared_across_instances() {
        let test = TestStack::start().await.unwrap();
        let token = mint("user-1", Utc::now() - Duration::seconds(30));

        test.stack
            .handler
            .blacklist_all_user_tokens("user-1", "security_breach", Some("admin-1"))
            .await
            .unwrap();

        let sibling = test.sibling().await.unwrap();
        let result = sibling.handler.verify_and_unpack(&token).await;
        assert!(result.is_blacklisted);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_records() {
        let test = TestStack::start().await.unwrap();
        let db = &test.stack.database;
        let now = Utc::now();

        for (id, expires_at) in [("expired", now - Duration::days(1)), ("live", now + Duration::days(1))] {
            db.add_blacklist_entry(&BlacklistEntry {
                entry_id: format!("entry-{id}"),
                token_identifier: id.to_string(),
                owner_auth_identifier: "user-1".to_string(),
                blacklisted_at: now - Duration::days(40),
                blacklisted_by_user_id: None,
                reason: "user_logout".to_string(),
                expires_at,
            })
            .await
            .unwrap();
        }
        for (owner, expires_at) in [("user-old", now - Duration::days(1)), ("user-new", now + Duration::days(1))] {
            db.add_user_revocation(&GlobalRevocation {
                owner_auth_identifier: owner.to_string(),
                revoked_at: now - Duration::days(29),
                reason: "user_logout".to_string(),
                revoked_by_user_id: None,
                expires_at,
            })
            .await
            .unwrap();
        }

        let handler = &test.stack.handler;
        assert_eq!(handler.cleanup_expired_entries().await.unwrap(), 2);

        assert!(!handler.is_token_blacklisted("expired").await.unwrap());
        assert!(handler.is_token_blacklisted("live").await.unwrap());
        assert!(handler.get_user_token_revocation_time("user-old").await.unwrap().is_none());
        assert!(handler.get_user_token_revocation_time("user-new").await.unwrap().is_some());

        // Idempotent.
        assert_eq!(handler.cleanup_expired_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_before_storage() {
        let test = TestStack::start().await.unwrap();
        let token = sign(&json!({
            "iss": ISSUER,
            "uid": "user-1",
            "iat": (Utc::now() - Duration::hours(3)).timestamp(),
            "exp": (Utc::now() - Duration::hours(2)).timestamp(),
        }));

        let result = test.stack.handler.verify_and_unpack(&token).await;
        assert_eq!(result.error, Some(ErrorCode::Expired));

        let revoked = test
            .stack
            .handler
            .revoke_token(&token, "user_logout", None)
            .await
            .unwrap();
        assert!(revoked.is_none());
    }
}
