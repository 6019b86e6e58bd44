//! # Vigile Storage
//!
//! Storage port for token blacklist entries and per-user global revocations.
//!
//! Provides the [`TokenDatabase`] trait that persistence backends implement,
//! the record types they store, and an in-memory backend for development.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod database;
pub mod error;
pub mod memory;
pub mod records;

pub use database::TokenDatabase;
pub use error::StorageError;
pub use memory::MemoryTokenDatabase;
pub use records::{BlacklistEntry, GlobalRevocation};
