//! Bearer access token extractor.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::{AuthError, RejectReason};
use crate::http::session::SessionState;
use crate::token::Claims;

/// Verified bearer of an access token.
///
/// Rejects with `401 invalid_token` when the `Authorization` header is
/// missing, is not a Bearer credential, or carries an invalid, expired or
/// refresh token.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    /// Subject the token is bound to.
    pub subject_id: String,
    /// Verified claims.
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    SessionState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session_state = SessionState::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .ok_or_else(|| {
                tracing::debug!(endpoint = %parts.uri.path(), "Missing bearer credential");
                AuthError::rejected_access(RejectReason::InvalidToken)
            })?;

        let claims = session_state.token_service.verify_access(token)?;

        Ok(Self {
            subject_id: claims.sub.clone(),
            claims,
        })
    }
}

fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
