//! Token issuance configuration.
//!
//! Lifetimes, signing secret and refresh token hashing cost are passed to the
//! token service at construction; nothing here is process-global.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum secret length in bytes for HMAC-SHA512 signing.
pub const MIN_SECRET_LEN: usize = 32;

/// Root token configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
/// secret = "change-me-to-at-least-32-random-bytes"
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "30d"
///
/// [auth.hashing]
/// memory_kib = 19456
/// iterations = 2
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer claim written into and required from every token.
    pub issuer: String,

    /// HMAC signing secret shared by signing and verification.
    pub secret: SigningSecret,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Deadline applied to every storage and hashing call.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Refresh token hashing cost.
    pub hashing: HashingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "rotor".to_string(),
            secret: SigningSecret::default(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            operation_timeout: Duration::from_secs(5),
            hashing: HashingConfig::default(),
        }
    }
}

/// Argon2id cost parameters.
///
/// Higher values slow down both login and brute force.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,

    /// Number of passes.
    pub iterations: u32,

    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Signing secret with a redacted `Debug` form.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SigningSecret(String);

impl SigningSecret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the secret length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no secret is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret([redacted; {} bytes])", self.0.len())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Creates a configuration with the given secret and defaults elsewhere.
    #[must_use]
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: SigningSecret::new(secret),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no secret is set, and
    /// `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - The secret is shorter than [`MIN_SECRET_LEN`] bytes
    /// - A lifetime is shorter than one second, or the operation timeout is zero
    /// - The access token does not expire at least a second before the refresh token
    /// - Argon2 rejects the hashing parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if self.secret.is_empty() {
            return Err(ConfigError::Missing("secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        // Token expiry has whole-second precision.
        let access_secs = self.access_token_lifetime.as_secs();
        let refresh_secs = self.refresh_token_lifetime.as_secs();
        if access_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be at least 1s".to_string(),
            ));
        }
        if refresh_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be at least 1s".to_string(),
            ));
        }
        if access_secs >= refresh_secs {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be shorter than refresh_token_lifetime".to_string(),
            ));
        }

        if self.operation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "operation_timeout must be > 0".to_string(),
            ));
        }

        self.hashing.params()?;

        Ok(())
    }
}

impl HashingConfig {
    /// Builds Argon2 parameters from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if Argon2 rejects the values
    /// (for example memory below `8 * parallelism` KiB).
    pub fn params(&self) -> Result<argon2::Params, ConfigError> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| ConfigError::InvalidValue(format!("hashing: {e}")))
    }
}
