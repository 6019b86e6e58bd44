//! Authentication error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vigile_storage::StorageError;

/// Closed taxonomy of verification failures.
///
/// Every provider-specific error is mapped onto one of these codes before it
/// reaches a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Token is past its expiry.
    Expired,
    /// Signature does not verify against the configured key.
    InvalidSignature,
    /// Token (or a required claim) could not be decoded.
    Malformed,
    /// Issuer or audience does not match the configuration.
    IssuerMismatch,
    /// Token was blacklisted or revoked.
    Blacklisted,
    /// Anything else, including storage failures.
    Unknown,
}

impl ErrorCode {
    /// Returns the wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Expired => "EXPIRED",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::IssuerMismatch => "ISSUER_MISMATCH",
            ErrorCode::Blacklisted => "BLACKLISTED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by blacklist and revocation operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Reason is not in the configured set.
    #[error("invalid blacklist reason: {reason}")]
    InvalidReason {
        /// The rejected reason.
        reason: String,
    },

    /// Owner auth identifier is empty.
    #[error("owner auth identifier cannot be empty")]
    InvalidOwner,

    /// Token identifier is empty.
    #[error("token identifier cannot be empty")]
    InvalidIdentifier,

    /// Custom claims could not be serialized.
    #[error("invalid custom claims: {0}")]
    InvalidClaims(String),

    /// Identity provider call failed.
    #[error("provider error ({code}): {message}")]
    Provider {
        /// Mapped error code.
        code: ErrorCode,
        /// Provider error description.
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
