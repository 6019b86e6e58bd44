//! # Vigile Crypto
//!
//! Small cryptographic helpers shared by the Vigile crates:
//! - SHA-256 fingerprints used as stable token identifiers
//! - Secure random identifiers for blacklist entries

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod digest;
pub mod random;

pub use digest::sha256_hex;
pub use random::generate_token;
