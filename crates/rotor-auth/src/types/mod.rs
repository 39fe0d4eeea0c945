//! Common types shared by the token service, storage and HTTP layers.
//!
//! - [`SessionRecord`] - Persisted proof of a subject's live refresh token
//! - [`TokenPair`] - Access/refresh token pair returned to clients

pub mod session;

pub use session::{SessionRecord, TokenPair, generate_session_id};
