//! HTTP handlers for session endpoints.
//!
//! # Available Handlers
//!
//! - [`issue_handler`] - Issue a token pair for a subject
//! - [`refresh_handler`] - Rotate a refresh token
//! - [`whoami_handler`] - Describe the bearer of an access token
//!
//! Routing is left to the server crate.

pub mod bearer;
pub mod error;
pub mod session;

pub use bearer::BearerAuth;
pub use error::ErrorBody;
pub use session::{
    REFRESH_TOKEN_HEADER, RefreshRequest, SessionState, WhoAmIResponse, issue_handler,
    refresh_handler, whoami_handler,
};
