//! # rotor-auth
//!
//! Access and refresh token issuance with single-slot refresh token rotation.
//!
//! This crate provides:
//! - Signed, timestamped bearer tokens bound to a subject identifier
//! - Argon2id proofs of the live refresh token
//! - A rotation protocol that redeems each refresh token exactly once
//! - Storage traits and an in-memory session store
//! - Axum handlers and extractors for the login/refresh endpoints
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, signing secret and hashing cost
//! - [`token`] - Token codec, refresh token hasher and the token service
//! - [`storage`] - Session storage trait and in-memory implementation
//! - [`types`] - Session records and token pairs
//! - [`http`] - Axum HTTP handlers and the bearer extractor

pub mod config;
pub mod error;
pub mod http;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, HashingConfig};
pub use error::{AuthError, ErrorCategory, RejectReason, TokenKind};
pub use http::{BearerAuth, SessionState, issue_handler, refresh_handler, whoami_handler};
pub use storage::{InMemorySessionStore, SessionStore};
pub use token::{
    Claims, CodecError, SecretHasher, TokenCodec, TokenConfig, TokenService,
};
pub use types::{SessionRecord, TokenPair};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use rotor_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError, HashingConfig};
    pub use crate::error::{AuthError, ErrorCategory, RejectReason, TokenKind};
    pub use crate::storage::{InMemorySessionStore, SessionStore};
    pub use crate::token::{Claims, SecretHasher, TokenCodec, TokenConfig, TokenService};
    pub use crate::types::{SessionRecord, TokenPair};
}
