//! `PostgreSQL` implementation of the `OrderCore` store traits
//!
//! This crate provides a complete `PostgreSQL` implementation of the
//! `CatalogStore`, `OrderStore` and `UserStore` traits with support for
//! multi-table atomic order commits and optimistic concurrency control.
//!
//! Guarded stock writes run inside a database transaction as
//! `UPDATE … WHERE record_version = $n`; a statement that affects zero rows
//! aborts the transaction, which distinguishes a vanished product from a
//! stale version and maps to the corresponding store error. Nothing of a
//! rejected commit is ever visible to other connections.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod orders;
mod users;

use std::time::Duration;

use nutype::nutype;
use ordercore::errors::StoreError;
use ordercore::types::{RecordVersion, Timestamp};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use thiserror::Error;

/// Errors raised while setting up the adapter itself.
#[derive(Debug, Error)]
pub enum PostgresStoreError {
    /// The connection pool could not be created.
    #[error("failed to create postgres connection pool")]
    ConnectionFailed(#[source] sqlx::Error),
    /// Schema migrations failed to run.
    #[error("failed to run postgres migrations")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Maximum number of database connections in the pool.
///
/// Must be at least 1, enforced by using `NonZeroU32` as the underlying
/// type.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(std::num::NonZeroU32);

/// Configuration for the `PostgresStore` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10).
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30s).
    pub acquire_timeout: Duration,
    /// Idle timeout for pooled connections (default: 10 minutes).
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(10)
        {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// `PostgreSQL`-backed store implementing all `OrderCore` store traits.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new store with default pool configuration.
    pub async fn new<S: Into<String>>(connection_string: S) -> Result<Self, PostgresStoreError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Create a new store with custom pool configuration.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresStoreError> {
        let connection_string = connection_string.into();
        let max_connections: std::num::NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string)
            .await
            .map_err(PostgresStoreError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool.
    ///
    /// Use this when you need full control over pool configuration or want
    /// to share a pool across components.
    pub const fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Verifies connectivity.
    pub async fn ping(&self) -> Result<(), PostgresStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(PostgresStoreError::ConnectionFailed)
    }

    /// Runs the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), PostgresStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(PostgresStoreError::MigrationFailed)
    }

    pub(crate) const fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// Maps an infrastructure-level sqlx failure to a store error.
pub(crate) fn map_sqlx_error(error: &sqlx::Error) -> StoreError {
    StoreError::Connection(error.to_string())
}

/// Whether the error is a unique-constraint violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|db| db.code())
        .as_deref()
        == Some("23505")
}

pub(crate) fn serialization(error: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(error.to_string())
}

pub(crate) fn version_to_i64(version: RecordVersion) -> i64 {
    i64::try_from(u64::from(version)).unwrap_or(i64::MAX)
}

pub(crate) fn version_from_i64(raw: i64) -> Result<RecordVersion, StoreError> {
    let value = u64::try_from(raw).map_err(serialization)?;
    RecordVersion::try_new(value).map_err(serialization)
}

pub(crate) fn timestamp_from_row(
    raw: chrono::DateTime<chrono::Utc>,
) -> Timestamp {
    Timestamp::new(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reasonable() {
        let config = PostgresConfig::default();
        let max: std::num::NonZeroU32 = config.max_connections.into();
        assert_eq!(max.get(), 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn version_round_trips_through_i64() {
        let version = RecordVersion::initial().next().next();
        let raw = version_to_i64(version);
        assert_eq!(raw, 3);
        assert_eq!(version_from_i64(raw).unwrap(), version);
        assert!(version_from_i64(-1).is_err());
        assert!(version_from_i64(0).is_err());
    }
}
