//! Error responses.
//!
//! Bodies follow the OAuth 2.0 shape `{"error", "error_description"}`.
//! Rejections and internal failures never describe their cause.

use axum::Json;
use axum::http::header::{CACHE_CONTROL, PRAGMA, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (`invalid_request`, `invalid_token`, `server_error`).
    pub error: String,

    /// Human-readable description.
    pub error_description: String,
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Rejected { .. } => StatusCode::UNAUTHORIZED,
            Self::Storage { .. } | Self::Timeout { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_description(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::Rejected { .. } => self.to_string(),
            Self::Storage { .. } | Self::Timeout { .. } | Self::Internal { .. } => {
                "The server encountered an internal error".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code().to_string(),
            error_description: self.public_description(),
        };

        let mut response = (
            status,
            [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")],
            Json(body),
        )
            .into_response();

        if self.is_rejection() {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}
