//! Authentication error types.
//!
//! Errors fall into three classes: validation of caller input, rejection of a
//! presented credential, and internal failures (hashing, storage, timeouts).
//! Rejections keep their precise reason for logging, but render the same
//! generic message whatever the reason.

use std::fmt;

/// Which kind of token a rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived bearer credential.
    Access,
    /// Long-lived credential redeemable for a new pair.
    Refresh,
}

impl TokenKind {
    /// Returns the lowercase name used in messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal reason a presented token was rejected.
///
/// Never echoed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Bad signature, wrong issuer, malformed encoding or missing claims.
    InvalidToken,
    /// The token's `exp` has been reached.
    Expired,
    /// No current session carries the token's session id.
    StaleSession,
    /// The stored proof does not match the presented token.
    HashMismatch,
}

impl RejectReason {
    /// Returns a stable identifier for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::Expired => "expired",
            Self::StaleSession => "stale_session",
            Self::HashMismatch => "hash_mismatch",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while issuing, rotating or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The caller supplied malformed or missing input.
    #[error("Invalid request: {message}")]
    Validation {
        /// Description of what was wrong with the input.
        message: String,
    },

    /// A presented token was refused.
    ///
    /// The display form deliberately omits `reason`.
    #[error("Invalid {kind} token")]
    Rejected {
        /// The kind of token that was presented.
        kind: TokenKind,
        /// Why it was refused.
        reason: RejectReason,
    },

    /// Session storage failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An operation did not finish within the configured deadline.
    #[error("Timed out: {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a rejection of a refresh token.
    #[must_use]
    pub fn rejected_refresh(reason: RejectReason) -> Self {
        Self::Rejected {
            kind: TokenKind::Refresh,
            reason,
        }
    }

    /// Creates a rejection of an access token.
    #[must_use]
    pub fn rejected_access(reason: RejectReason) -> Self {
        Self::Rejected {
            kind: TokenKind::Access,
            reason,
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the rejection reason, if this is a rejection.
    #[must_use]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Rejected { .. })
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Timeout { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if a presented token was refused.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Rejected { .. } => ErrorCategory::Authentication,
            Self::Storage { .. } | Self::Timeout { .. } | Self::Internal { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns the OAuth 2.0 style error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request",
            Self::Rejected { .. } => "invalid_token",
            Self::Storage { .. } | Self::Timeout { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or missing caller input.
    Validation,
    /// A presented credential was refused.
    Authentication,
    /// Hashing, storage or deadline failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
