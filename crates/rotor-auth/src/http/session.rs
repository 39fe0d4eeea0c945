//! Session endpoint handlers.
//!
//! - `GET /auth/session/{subject_id}` issues a token pair
//! - `POST /auth/refresh` rotates a refresh token taken from the
//!   `RefreshToken` header or a JSON body `{"refresh_token": "..."}`
//! - `GET /auth/whoami` describes the bearer of an access token

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, PRAGMA};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AuthError;
use crate::http::bearer::BearerAuth;
use crate::token::TokenService;
use crate::types::TokenPair;

/// Header carrying the refresh token on `POST /auth/refresh`.
pub const REFRESH_TOKEN_HEADER: &str = "refreshtoken";

/// Shared state for the session handlers.
#[derive(Clone)]
pub struct SessionState {
    /// Token service.
    pub token_service: Arc<TokenService>,
}

impl SessionState {
    /// Creates a new session state.
    pub fn new(token_service: Arc<TokenService>) -> Self {
        Self { token_service }
    }
}

/// JSON body accepted by `POST /auth/refresh`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshRequest {
    /// The refresh token to redeem.
    pub refresh_token: String,
}

/// Response of `GET /auth/whoami`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    /// Subject the access token is bound to.
    pub subject_id: String,

    /// When the access token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Issues a token pair for the subject in the path.
pub async fn issue_handler(
    State(state): State<SessionState>,
    Path(subject_id): Path<String>,
) -> Response {
    match state.token_service.issue(&subject_id).await {
        Ok(pair) => pair_response(pair),
        Err(e) => e.into_response(),
    }
}

/// Rotates the presented refresh token.
pub async fn refresh_handler(
    State(state): State<SessionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let refresh_token = match extract_refresh_token(&headers, &body) {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    match state.token_service.rotate(&refresh_token).await {
        Ok(pair) => pair_response(pair),
        Err(e) => e.into_response(),
    }
}

/// Returns the subject and expiry of the bearer's access token.
pub async fn whoami_handler(auth: BearerAuth) -> Response {
    let expires_at = match auth.claims.expires_at() {
        Some(at) => at,
        None => return AuthError::internal("access token expiry out of range").into_response(),
    };
    let body = WhoAmIResponse {
        subject_id: auth.subject_id,
        expires_at,
    };
    (
        StatusCode::OK,
        [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")],
        Json(body),
    )
        .into_response()
}

/// Reads the refresh token from the header, falling back to the JSON body.
fn extract_refresh_token(headers: &HeaderMap, body: &[u8]) -> Result<String, AuthError> {
    if let Some(value) = headers.get(REFRESH_TOKEN_HEADER) {
        let token = value
            .to_str()
            .map_err(|_| AuthError::validation("RefreshToken header is not valid ASCII"))?
            .trim();
        if token.is_empty() {
            return Err(AuthError::validation("RefreshToken header is empty"));
        }
        return Ok(token.to_string());
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AuthError::validation("refresh token is required"));
    }

    let request: RefreshRequest = serde_json::from_slice(body)
        .map_err(|e| AuthError::validation(format!("invalid request body: {e}")))?;
    let token = request.refresh_token.trim();
    if token.is_empty() {
        return Err(AuthError::validation("refresh token is required"));
    }
    Ok(token.to_string())
}

fn pair_response(pair: TokenPair) -> Response {
    (
        StatusCode::OK,
        [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")],
        Json(pair),
    )
        .into_response()
}
