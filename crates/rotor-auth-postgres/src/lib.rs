//! PostgreSQL session storage for rotor-auth.
//!
//! Sessions live in a single table, `rotor_auth.sessions`, with one row per
//! subject. Rotation is one conditional `UPDATE`, so concurrent redemptions of
//! the same refresh token are serialized by the row lock.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rotor_auth_postgres::PostgresSessionStore;
//!
//! let store = PostgresSessionStore::connect("postgres://localhost/rotor").await?;
//! store.ensure_schema().await?;
//! let service = TokenService::from_config(&config, Arc::new(store))?;
//! ```

pub mod pool;
pub mod schema;
pub mod session;
mod store;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use pool::{PoolSettings, create_pool};
pub use session::{SessionRow, SessionStorage};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// A session id is already in use by another subject.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Session Store
// =============================================================================

/// PostgreSQL-backed [`SessionStore`](rotor_auth::SessionStore).
#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pool: Arc<PgPool>,
}

impl PostgresSessionStore {
    /// Create a new store with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new store by connecting with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(&PoolSettings::new(database_url)).await
    }

    /// Create a new store by connecting with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(settings: &PoolSettings) -> StorageResult<Self> {
        let pool = create_pool(settings).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Session table operations borrowing this store's pool.
    #[must_use]
    pub fn sessions(&self) -> SessionStorage<'_> {
        SessionStorage::new(&self.pool)
    }

    /// Creates the schema and sessions table if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        schema::ensure(&self.pool).await
    }

    /// Drops the sessions table.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    #[cfg(feature = "test-harness")]
    pub async fn drop_schema(&self) -> StorageResult<()> {
        schema::drop_tables(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::conflict("session id already in use");
        assert_eq!(err.to_string(), "Conflict: session id already in use");
        assert!(err.is_conflict());
        assert!(!err.is_database_error());

        let err = StorageError::invalid_input("empty subject");
        assert_eq!(err.to_string(), "Invalid input: empty subject");
    }

    #[test]
    fn test_database_error_from_sqlx() {
        let err = StorageError::from(sqlx_core::Error::RowNotFound);
        assert!(err.is_database_error());
        assert!(err.to_string().starts_with("Database error"));
    }
}
