//! JWT identity provider adapter.
//!
//! Verifies JWTs issued by an external identity service and, when an admin
//! API is configured, pushes custom claims and revokes sessions there.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::adapter::{resolve_auth_identifier, DecodedToken, ProviderAdapter};
use crate::claims::CustomClaimsConfig;
use crate::error::ErrorCode;
use crate::token::NormalizedToken;

/// Errors raised by the identity provider adapter.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token has expired.
    #[error("token expired")]
    Expired,

    /// Signature or algorithm does not match the configured key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Issuer claim does not match.
    #[error("issuer mismatch")]
    IssuerMismatch,

    /// Audience claim does not match.
    #[error("audience mismatch")]
    AudienceMismatch,

    /// Token could not be decoded.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No admin API is configured for this provider.
    #[error("provider admin API not configured")]
    AdminApiUnavailable,

    /// Admin API answered with a non-success status.
    #[error("provider admin API returned status {status}")]
    AdminApi {
        /// HTTP status code.
        status: u16,
    },

    /// Admin API could not be reached.
    #[error("http error: {0}")]
    Http(String),

    /// Invalid provider configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other verification failure.
    #[error("verification failed: {0}")]
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for IdentityError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => IdentityError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                IdentityError::InvalidSignature
            },
            ErrorKind::InvalidIssuer => IdentityError::IssuerMismatch,
            ErrorKind::InvalidAudience => IdentityError::AudienceMismatch,
            ErrorKind::InvalidToken
            | ErrorKind::MissingAlgorithm
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => IdentityError::Malformed(e.to_string()),
            _ => IdentityError::Other(e.to_string()),
        }
    }
}

/// Configuration for the identity provider adapter.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    /// Expected issuer (e.g., "https://id.example.com").
    pub issuer: String,

    /// Expected audience. Not checked when absent.
    #[serde(default)]
    pub audience: Option<String>,

    /// Signature algorithm.
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,

    /// Shared secret for HMAC algorithms.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// PEM public key for RSA, ECDSA and EdDSA algorithms.
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// Clock skew tolerance in seconds.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// Claim carrying the application user id.
    #[serde(default = "default_app_user_id_claim")]
    pub app_user_id_claim: String,

    /// Base URL of the provider admin API.
    #[serde(default)]
    pub admin_url: Option<String>,

    /// Bearer token for the admin API.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Admin API request timeout in seconds.
    #[serde(default = "default_admin_timeout_secs")]
    pub admin_timeout_secs: u64,
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn default_leeway_secs() -> u64 {
    30
}

fn default_app_user_id_claim() -> String {
    "app_user_id".to_string()
}

fn default_admin_timeout_secs() -> u64 {
    10
}

impl IdentityProviderConfig {
    /// Creates a configuration for HS256 tokens signed with a shared secret.
    pub fn hs256(issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: None,
            algorithm: Algorithm::HS256,
            jwt_secret: Some(secret.into()),
            public_key_pem: None,
            leeway_secs: default_leeway_secs(),
            app_user_id_claim: default_app_user_id_claim(),
            admin_url: None,
            admin_token: None,
            admin_timeout_secs: default_admin_timeout_secs(),
        }
    }

    /// Builds the decoding key for the configured algorithm.
    fn decoding_key(&self) -> Result<DecodingKey, IdentityError> {
        let missing = |what: &str| {
            IdentityError::Configuration(format!("{what} required for {:?}", self.algorithm))
        };
        let invalid = |e: jsonwebtoken::errors::Error| {
            IdentityError::Configuration(format!("invalid public key: {e}"))
        };

        match self.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = self
                    .jwt_secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| missing("jwt_secret"))?;
                Ok(DecodingKey::from_secret(secret.as_bytes()))
            },
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => {
                let pem = self.public_key_pem.as_deref().ok_or_else(|| missing("public_key_pem"))?;
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(invalid)
            },
            Algorithm::ES256 | Algorithm::ES384 => {
                let pem = self.public_key_pem.as_deref().ok_or_else(|| missing("public_key_pem"))?;
                DecodingKey::from_ec_pem(pem.as_bytes()).map_err(invalid)
            },
            Algorithm::EdDSA => {
                let pem = self.public_key_pem.as_deref().ok_or_else(|| missing("public_key_pem"))?;
                DecodingKey::from_ed_pem(pem.as_bytes()).map_err(invalid)
            },
        }
    }
}

impl fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("IdentityProviderConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithm", &self.algorithm)
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("leeway_secs", &self.leeway_secs)
            .field("app_user_id_claim", &self.app_user_id_claim)
            .field("admin_url", &self.admin_url)
            .field("admin_token", &redact(&self.admin_token))
            .finish()
    }
}

/// Typed view of the claims the adapter understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityClaims {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
    #[serde(default)]
    iss: Option<String>,
}

/// A token verified by [`IdentityProvider`].
#[derive(Debug, Clone)]
pub struct IdentityToken {
    claims: IdentityClaims,
    raw: Map<String, Value>,
}

impl IdentityToken {
    /// Every decoded claim.
    pub fn raw_claims(&self) -> &Map<String, Value> {
        &self.raw
    }
}

impl DecodedToken for IdentityToken {
    fn uid(&self) -> Option<&str> {
        self.claims.uid.as_deref()
    }

    fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    fn provider_user_id(&self) -> Option<&str> {
        self.claims.user_id.as_deref()
    }

    fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.claims.iat.and_then(|iat| DateTime::from_timestamp(iat, 0))
    }

    fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Provider adapter for JWTs issued by an external identity service.
pub struct IdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
    app_user_id_claim: String,
    admin_url: Option<Url>,
    admin_token: Option<String>,
    http: Client,
}

impl IdentityProvider {
    /// Creates a new identity provider adapter.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Configuration`] when key material is missing
    /// or invalid, or the admin URL cannot be parsed.
    pub fn new(config: IdentityProviderConfig) -> Result<Self, IdentityError> {
        if config.issuer.trim().is_empty() {
            return Err(IdentityError::Configuration("issuer cannot be empty".into()));
        }

        let decoding_key = config.decoding_key()?;

        let mut validation = Validation::new(config.algorithm);
        validation.set_issuer(&[&config.issuer]);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = false;

        let admin_url = config
            .admin_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| IdentityError::Configuration(format!("invalid admin_url: {e}")))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.admin_timeout_secs))
            .build()
            .map_err(|e| IdentityError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            decoding_key,
            validation,
            app_user_id_claim: config.app_user_id_claim,
            admin_url,
            admin_token: config.admin_token,
            http,
        })
    }

    /// Builds `{admin_url}/users/{auth_identifier}/{action}`.
    fn admin_endpoint(&self, auth_identifier: &str, action: &str) -> Result<Option<Url>, IdentityError> {
        let Some(base) = &self.admin_url else {
            return Ok(None);
        };

        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::Configuration("admin_url cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["users", auth_identifier, action]);

        Ok(Some(url))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn application_user_id(&self, raw: &Map<String, Value>) -> Option<String> {
        match raw.get(&self.app_user_id_claim)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for IdentityProvider {
    type Token = IdentityToken;
    type Error = IdentityError;

    async fn verify_token(&self, raw: &str) -> Result<IdentityToken, IdentityError> {
        let data = decode::<Map<String, Value>>(raw, &self.decoding_key, &self.validation)?;
        let raw_claims = data.claims;

        let claims: IdentityClaims = serde_json::from_value(Value::Object(raw_claims.clone()))
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;

        Ok(IdentityToken {
            claims,
            raw: raw_claims,
        })
    }

    fn normalize_token<C: Clone>(
        &self,
        decoded: &IdentityToken,
        claims: &CustomClaimsConfig<C>,
    ) -> NormalizedToken<C> {
        let expires_at = decoded.expires_at();
        let issued_at = decoded
            .issued_at()
            .unwrap_or(DateTime::UNIX_EPOCH)
            .min(expires_at);

        NormalizedToken {
            auth_identifier: resolve_auth_identifier(decoded),
            application_user_id: self.application_user_id(&decoded.raw),
            email: decoded.claims.email.clone(),
            email_verified: decoded.claims.email_verified.unwrap_or(false),
            phone_number: decoded.claims.phone_number.clone(),
            issued_at,
            expires_at,
            issuer: decoded.claims.iss.clone().unwrap_or_default(),
            custom_claims: claims.resolve(&decoded.raw),
            raw_claims: decoded.raw.clone(),
        }
    }

    async fn sync_custom_claims(&self, auth_identifier: &str, claims: &Value) -> Result<(), IdentityError> {
        let url = self
            .admin_endpoint(auth_identifier, "claims")?
            .ok_or(IdentityError::AdminApiUnavailable)?;

        let response = self
            .authorized(self.http.put(url))
            .json(claims)
            .send()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::AdminApi {
                status: response.status().as_u16(),
            });
        }

        debug!(user = %auth_identifier, "Custom claims synced to provider");
        Ok(())
    }

    async fn revoke_user_tokens(&self, auth_identifier: &str) -> Result<bool, IdentityError> {
        let Some(url) = self.admin_endpoint(auth_identifier, "revoke")? else {
            debug!(user = %auth_identifier, "No provider admin API, native revocation skipped");
            return Ok(false);
        };

        let response = self
            .authorized(self.http.post(url))
            .send()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::AdminApi {
                status: response.status().as_u16(),
            });
        }

        info!(user = %auth_identifier, "Provider revoked user tokens");
        Ok(true)
    }

    fn map_provider_error(&self, error: &IdentityError) -> ErrorCode {
        match error {
            IdentityError::Expired => ErrorCode::Expired,
            IdentityError::InvalidSignature => ErrorCode::InvalidSignature,
            IdentityError::IssuerMismatch | IdentityError::AudienceMismatch => {
                ErrorCode::IssuerMismatch
            },
            IdentityError::Malformed(_) => ErrorCode::Malformed,
            IdentityError::AdminApiUnavailable
            | IdentityError::AdminApi { .. }
            | IdentityError::Http(_)
            | IdentityError::Configuration(_)
            | IdentityError::Other(_) => ErrorCode::Unknown,
        }
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}
