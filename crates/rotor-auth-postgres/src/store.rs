//! `SessionStore` implementation over the session table.

use async_trait::async_trait;

use rotor_auth::{AuthError, AuthResult, SessionRecord, SessionStore};

use crate::PostgresSessionStore;

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn upsert_session(
        &self,
        subject_id: &str,
        session_id: &str,
        refresh_hash: &str,
    ) -> AuthResult<()> {
        self.sessions()
            .upsert(subject_id, session_id, refresh_hash)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn find_by_subject(&self, subject_id: &str) -> AuthResult<Option<SessionRecord>> {
        self.sessions()
            .find_by_subject(subject_id)
            .await
            .map(|row| row.map(SessionRecord::from))
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn find_by_session_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        self.sessions()
            .find_by_session_id(session_id)
            .await
            .map(|row| row.map(SessionRecord::from))
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn replace_if_current(
        &self,
        subject_id: &str,
        expected_session_id: &str,
        new_session_id: &str,
        new_refresh_hash: &str,
    ) -> AuthResult<bool> {
        self.sessions()
            .replace_if_current(
                subject_id,
                expected_session_id,
                new_session_id,
                new_refresh_hash,
            )
            .await
            .map_err(|e| AuthError::storage(e.to_string()))
    }
}
