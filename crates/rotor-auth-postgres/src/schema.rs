//! Session table DDL.

use sqlx_core::query::query;

use crate::{PgPool, StorageResult};

/// Schema holding the session table.
pub const SCHEMA: &str = "rotor_auth";

const CREATE_STATEMENTS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS rotor_auth",
    r#"
    CREATE TABLE IF NOT EXISTS rotor_auth.sessions (
        subject_id   TEXT PRIMARY KEY,
        session_id   TEXT NOT NULL UNIQUE,
        refresh_hash TEXT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

/// Creates the schema and sessions table if missing.
pub(crate) async fn ensure(pool: &PgPool) -> StorageResult<()> {
    for statement in CREATE_STATEMENTS {
        query(*statement).execute(pool).await?;
    }
    tracing::debug!(schema = SCHEMA, "Session schema ready");
    Ok(())
}

/// Drops the sessions table.
#[cfg(feature = "test-harness")]
pub(crate) async fn drop_tables(pool: &PgPool) -> StorageResult<()> {
    query("DROP TABLE IF EXISTS rotor_auth.sessions")
        .execute(pool)
        .await?;
    tracing::warn!(schema = SCHEMA, "Session table dropped");
    Ok(())
}
