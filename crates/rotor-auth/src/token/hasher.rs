//! One-way hashing of refresh tokens.
//!
//! Only an Argon2id digest of the live refresh token is persisted. Digests are
//! PHC strings, so the salt and cost travel with the hash and a digest written
//! under one cost setting still verifies after the setting changes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::{ConfigError, HashingConfig};

/// Salted Argon2id hasher with a fixed cost.
///
/// Hashing is CPU-bound and synchronous. Callers on an async runtime should
/// run it through `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    /// Creates a hasher from cost configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if Argon2 rejects the parameters.
    pub fn new(config: &HashingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            params: config.params()?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `raw` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `argon2::password_hash::Error` if hashing fails.
    pub fn hash(&self, raw: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2().hash_password(raw.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Returns `true` if `raw` hashes to `digest`.
    ///
    /// A digest that cannot be parsed compares false.
    #[must_use]
    pub fn compare(&self, digest: &str, raw: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored refresh token digest is malformed");
                return false;
            }
        };
        self.argon2()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok()
    }
}
