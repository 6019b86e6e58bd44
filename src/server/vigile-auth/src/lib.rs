//! # Vigile Auth
//!
//! Bearer token verification and revocation.
//!
//! ## Components
//!
//! - [`ProviderAdapter`] - per identity provider: verify, identify, normalize
//! - [`IdentityProvider`] - JWT adapter with an optional admin API
//! - [`BlacklistManager`] - individual blacklist entries and per-user revocations
//! - [`TokenHandler`] - verify-and-unpack orchestration
//! - [`CleanupService`] - scheduled removal of expired records

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod blacklist;
pub mod claims;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod mask;
pub mod token;

pub use adapter::{DecodedToken, ProviderAdapter};
pub use blacklist::{BlacklistConfig, BlacklistManager};
pub use claims::CustomClaimsConfig;
pub use cleanup::CleanupService;
pub use config::{CleanupConfig, ClaimsConfig, ConfigError, StorageConfig, StorageKind, VigileConfig};
pub use error::{AuthError, ErrorCode};
pub use handler::{RevocationOutcome, TokenHandler, VerificationResult};
pub use identity::{IdentityError, IdentityProvider, IdentityProviderConfig};
pub use mask::mask_identifier;
pub use token::NormalizedToken;
