//! Session table operations.
//!
//! One row per subject. The `session_id` column is unique, so a refresh
//! token's `jti` resolves to at most one row.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use rotor_auth::SessionRecord;

use crate::{PgPool, StorageError, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Session row from the database.
#[derive(Debug, Clone)]
pub struct SessionRow {
    /// Subject identifier (primary key)
    pub subject_id: String,
    /// Current session identifier
    pub session_id: String,
    /// PHC digest of the live refresh token
    pub refresh_hash: String,
    /// First authentication
    pub created_at: OffsetDateTime,
    /// Last issue or rotation
    pub updated_at: OffsetDateTime,
}

type RowTuple = (String, String, String, OffsetDateTime, OffsetDateTime);

impl SessionRow {
    fn from_tuple(row: RowTuple) -> Self {
        Self {
            subject_id: row.0,
            session_id: row.1,
            refresh_hash: row.2,
            created_at: row.3,
            updated_at: row.4,
        }
    }
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            subject_id: row.subject_id,
            session_id: row.session_id,
            refresh_hash: row.refresh_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Session Storage
// =============================================================================

/// Session table operations over a borrowed pool.
pub struct SessionStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionStorage<'a> {
    /// Create a new session storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the session for a subject.
    ///
    /// `created_at` survives the overwrite.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `session_id` is already used by
    /// another subject, or a database error.
    pub async fn upsert(
        &self,
        subject_id: &str,
        session_id: &str,
        refresh_hash: &str,
    ) -> StorageResult<()> {
        if subject_id.is_empty() || session_id.is_empty() {
            return Err(StorageError::invalid_input(
                "subject_id and session_id must not be empty",
            ));
        }

        query(
            r#"
            INSERT INTO rotor_auth.sessions (subject_id, session_id, refresh_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (subject_id) DO UPDATE
            SET session_id = EXCLUDED.session_id,
                refresh_hash = EXCLUDED.refresh_hash,
                updated_at = NOW()
            "#,
        )
        .bind(subject_id)
        .bind(session_id)
        .bind(refresh_hash)
        .execute(self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }

    /// Find the session for a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_subject(&self, subject_id: &str) -> StorageResult<Option<SessionRow>> {
        let row: Option<RowTuple> = query_as(
            r#"
            SELECT subject_id, session_id, refresh_hash, created_at, updated_at
            FROM rotor_auth.sessions
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(SessionRow::from_tuple))
    }

    /// Find the session currently carrying `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_session_id(&self, session_id: &str) -> StorageResult<Option<SessionRow>> {
        let row: Option<RowTuple> = query_as(
            r#"
            SELECT subject_id, session_id, refresh_hash, created_at, updated_at
            FROM rotor_auth.sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(SessionRow::from_tuple))
    }

    /// Replace the session id and digest if the current session id is still
    /// `expected_session_id`.
    ///
    /// Returns `true` if exactly one row was updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a session id collision, or a
    /// database error.
    pub async fn replace_if_current(
        &self,
        subject_id: &str,
        expected_session_id: &str,
        new_session_id: &str,
        new_refresh_hash: &str,
    ) -> StorageResult<bool> {
        let rows_affected = query(
            r#"
            UPDATE rotor_auth.sessions
            SET session_id = $3,
                refresh_hash = $4,
                updated_at = NOW()
            WHERE subject_id = $1 AND session_id = $2
            "#,
        )
        .bind(subject_id)
        .bind(expected_session_id)
        .bind(new_session_id)
        .bind(new_refresh_hash)
        .execute(self.pool)
        .await
        .map_err(map_unique_violation)?
        .rows_affected();

        Ok(rows_affected == 1)
    }
}

fn map_unique_violation(e: sqlx_core::Error) -> StorageError {
    if let sqlx_core::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StorageError::conflict("session id already in use");
    }
    StorageError::from(e)
}
