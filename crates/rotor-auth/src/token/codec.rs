//! Signed bearer token encoding and verification.
//!
//! Tokens are compact JWTs signed with HMAC-SHA512. Every token carries the
//! issuer, the subject and second-precision `iat`/`exp` timestamps. Refresh
//! tokens additionally carry the session identifier in `jti`.
//!
//! Expiry is checked here rather than by `jsonwebtoken` so that a token is
//! expired exactly when `now >= exp`, with no leeway.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use rotor_auth::token::TokenCodec;
//!
//! let codec = TokenCodec::new(b"0123456789abcdef0123456789abcdef", "rotor");
//! let token = codec.sign("user-42", Some("session-1"), Duration::from_secs(60))?;
//! let claims = codec.verify(&token)?;
//! assert_eq!(claims.sub, "user-42");
//! ```

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const ALGORITHM: Algorithm = Algorithm::HS512;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while signing or verifying a token.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// The token is not a well-formed JWT.
    #[error("Failed to decode token: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The token signature does not match its contents.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are wrong or incomplete (issuer, missing `sub`, ...).
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// The token's `exp` has been reached.
    #[error("Token expired")]
    Expired,
}

impl CodecError {
    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a new `Decoding` error.
    #[must_use]
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Returns `true` if the token itself was refused (as opposed to a
    /// failure to produce one).
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        !matches!(self, Self::Encoding { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for CodecError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            _ => Self::decoding(err.to_string()),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Issuer.
    pub iss: String,

    /// Subject identifier the token is bound to.
    pub sub: String,

    /// Issued at (Unix timestamp, seconds).
    pub iat: i64,

    /// Expiration time (Unix timestamp, seconds).
    pub exp: i64,

    /// Session identifier. Present on refresh tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Returns the session identifier, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    /// Returns the expiry as an [`OffsetDateTime`].
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.exp).ok()
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Signs and verifies bearer tokens with a shared HMAC secret.
///
/// Stateless after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenCodec {
    /// Creates a codec for the given secret and issuer.
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    /// Returns the issuer written into every token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs a token valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encoding` if the token cannot be produced.
    pub fn sign(
        &self,
        subject_id: &str,
        session_id: Option<&str>,
        ttl: Duration,
    ) -> Result<String, CodecError> {
        self.sign_at(subject_id, session_id, ttl, now())
    }

    /// Signs a token as if the current time were `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encoding` if `ttl` overflows the timestamp range
    /// or serialization fails.
    pub fn sign_at(
        &self,
        subject_id: &str,
        session_id: Option<&str>,
        ttl: Duration,
        issued_at: i64,
    ) -> Result<String, CodecError> {
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| issued_at.checked_add(secs))
            .ok_or_else(|| CodecError::encoding("token lifetime out of range"))?;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject_id.to_string(),
            iat: issued_at,
            exp,
            jti: session_id.map(str::to_string),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| CodecError::encoding(e.to_string()))
    }

    /// Verifies a token's signature, issuer and expiry.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidSignature`, `CodecError::InvalidClaims`,
    /// `CodecError::Decoding` or `CodecError::Expired`.
    pub fn verify(&self, token: &str) -> Result<Claims, CodecError> {
        self.verify_at(token, now())
    }

    /// Verifies a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, CodecError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;

        if claims.sub.is_empty() {
            return Err(CodecError::invalid_claims("empty subject"));
        }
        if now >= claims.exp {
            return Err(CodecError::Expired);
        }

        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
