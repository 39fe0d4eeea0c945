//! Session storage trait.
//!
//! # Security Considerations
//!
//! - Only refresh token digests are stored, never raw tokens
//! - A subject owns at most one session record
//! - Rotation must be a single conditional write, so that one refresh token
//!   can be redeemed at most once even under concurrent requests

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::SessionRecord;

/// Storage trait for subject sessions.
///
/// # Implementations
///
/// - [`InMemorySessionStore`](super::InMemorySessionStore) in this crate
/// - `rotor-auth-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates or overwrites the session for `subject_id`.
    ///
    /// Any previous session for the subject is superseded, so its refresh
    /// token stops being redeemable.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert_session(
        &self,
        subject_id: &str,
        session_id: &str,
        refresh_hash: &str,
    ) -> AuthResult<()>;

    /// Finds the session for a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_subject(&self, subject_id: &str) -> AuthResult<Option<SessionRecord>>;

    /// Finds the session currently carrying `session_id`.
    ///
    /// Returns `None` once the session has been rotated away.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_session_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>>;

    /// Replaces the session id and digest only if the subject's current
    /// session id is still `expected_session_id`.
    ///
    /// # Returns
    ///
    /// `true` if the record was replaced, `false` if another writer got there
    /// first or the subject has no session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn replace_if_current(
        &self,
        subject_id: &str,
        expected_session_id: &str,
        new_session_id: &str,
        new_refresh_hash: &str,
    ) -> AuthResult<bool>;
}
