//! # Vigile Storage - SQLite Backend
//!
//! SQLite implementation of the token database port.
//! Each storage location gets its own database file.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use vigile_storage::{BlacklistEntry, GlobalRevocation, StorageError, TokenDatabase};

/// SQL schema for the blacklist tables.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS blacklist_entries (
        entry_id          TEXT PRIMARY KEY,
        token_identifier  TEXT NOT NULL,
        owner             TEXT NOT NULL,
        blacklisted_at    INTEGER NOT NULL,
        blacklisted_by    TEXT,
        reason            TEXT NOT NULL,
        expires_at        INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_blacklist_token ON blacklist_entries (token_identifier)",
    "CREATE INDEX IF NOT EXISTS idx_blacklist_expires ON blacklist_entries (expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS user_revocations (
        owner       TEXT PRIMARY KEY,
        revoked_at  INTEGER NOT NULL,
        reason      TEXT NOT NULL,
        revoked_by  TEXT,
        expires_at  INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_revocations_expires ON user_revocations (expires_at)",
];

/// SQLite token database.
///
/// The database file lives at `{base_path}/{location}.db`.
#[derive(Clone)]
pub struct SqliteTokenDatabase {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteTokenDatabase {
    /// Opens or creates the database for a storage location.
    ///
    /// # Arguments
    ///
    /// * `base_path` - Directory where database files are stored
    /// * `location` - Storage location name (must match `[a-z0-9_-]+`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Location name is invalid
    /// - Directory cannot be created
    /// - Database connection or migration fails
    pub async fn open(base_path: impl AsRef<Path>, location: &str) -> Result<Self, StorageError> {
        Self::validate_location(location)?;

        let base = base_path.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(format!("{location}.db"));
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(location = %location, path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let db = Self { pool, db_path };
        db.migrate().await?;

        info!(location = %location, "SQLite token database ready");

        Ok(db)
    }

    /// Returns the path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Validates that a location name is safe to use as a file name.
    ///
    /// Only allows: lowercase letters, digits, underscore, hyphen.
    fn validate_location(location: &str) -> Result<(), StorageError> {
        if location.is_empty() {
            return Err(StorageError::InvalidInput("location cannot be empty".into()));
        }

        if location.len() > 64 {
            return Err(StorageError::InvalidInput("location name too long".into()));
        }

        let valid = location
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "location must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    /// Runs database migrations.
    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;
        }

        debug!("Migrations complete");

        Ok(())
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Serialization(format!("timestamp out of range: {ms}")))
}

fn query_failed(e: sqlx::Error) -> StorageError {
    StorageError::QueryFailed(e.to_string())
}

#[async_trait]
impl TokenDatabase for SqliteTokenDatabase {
    async fn add_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO blacklist_entries
                (entry_id, token_identifier, owner, blacklisted_at, blacklisted_by, reason, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.entry_id)
        .bind(&entry.token_identifier)
        .bind(&entry.owner_auth_identifier)
        .bind(to_millis(entry.blacklisted_at))
        .bind(entry.blacklisted_by_user_id.as_deref())
        .bind(&entry.reason)
        .bind(to_millis(entry.expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db_err| db_err.is_unique_violation()) {
                StorageError::AlreadyExists(entry.entry_id.clone())
            } else {
                query_failed(e)
            }
        })?;

        Ok(())
    }

    async fn is_token_blacklisted(&self, token_identifier: &str) -> Result<bool, StorageError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM blacklist_entries WHERE token_identifier = ? LIMIT 1")
                .bind(token_identifier)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;

        Ok(row.is_some())
    }

    async fn add_user_revocation(&self, revocation: &GlobalRevocation) -> Result<(), StorageError> {
        // Never let an older revocation replace a newer one.
        sqlx::query(
            r#"
            INSERT INTO user_revocations (owner, revoked_at, reason, revoked_by, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(owner) DO UPDATE SET
                revoked_at = excluded.revoked_at,
                reason = excluded.reason,
                revoked_by = excluded.revoked_by,
                expires_at = excluded.expires_at
            WHERE excluded.revoked_at >= user_revocations.revoked_at
            "#,
        )
        .bind(&revocation.owner_auth_identifier)
        .bind(to_millis(revocation.revoked_at))
        .bind(&revocation.reason)
        .bind(revocation.revoked_by_user_id.as_deref())
        .bind(to_millis(revocation.expires_at))
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn get_user_revocation_time(
        &self,
        owner_auth_identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT revoked_at FROM user_revocations WHERE owner = ? AND expires_at >= ?",
        )
        .bind(owner_auth_identifier)
        .bind(to_millis(now))
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.map(|(ms,)| from_millis(ms)).transpose()
    }

    async fn cleanup_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let cutoff = to_millis(now);
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let entries = sqlx::query("DELETE FROM blacklist_entries WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?
            .rows_affected();

        let revocations = sqlx::query("DELETE FROM user_revocations WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?
            .rows_affected();

        tx.commit().await.map_err(query_failed)?;

        debug!(entries = entries, revocations = revocations, "Expired records deleted");

        Ok(entries + revocations)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
