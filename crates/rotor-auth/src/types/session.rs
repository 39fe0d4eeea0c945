//! Session domain types.
//!
//! A subject has at most one session. The session id and the refresh token
//! digest always change together.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Persisted proof of a subject's live refresh token.
///
/// The raw refresh token is never stored, only its Argon2id digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Identity the tokens are bound to. One record per subject.
    pub subject_id: String,

    /// Identifier embedded (as `jti`) in the live refresh token.
    pub session_id: String,

    /// PHC-formatted digest of the live refresh token.
    pub refresh_hash: String,

    /// When the subject first authenticated.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session was last issued or rotated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SessionRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        session_id: impl Into<String>,
        refresh_hash: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            subject_id: subject_id.into(),
            session_id: session_id.into(),
            refresh_hash: refresh_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the session id and digest, keeping `created_at`.
    pub fn rotate(&mut self, session_id: impl Into<String>, refresh_hash: impl Into<String>) {
        self.session_id = session_id.into();
        self.refresh_hash = refresh_hash.into();
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Generates a fresh session identifier from OS randomness.
#[must_use]
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Access/refresh token pair returned to clients.
///
/// Serialized as `{"access_token", "refresh_token", "token_type", "expires_in"}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer token.
    pub access_token: String,

    /// Long-lived token redeemable exactly once for a new pair.
    pub refresh_token: String,

    /// Always `"Bearer"`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl TokenPair {
    /// Creates a bearer token pair.
    #[must_use]
    pub fn bearer(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
