//! Token service for issuing and rotating token pairs.
//!
//! - Issue: mint a fresh session for a subject, superseding any previous one
//! - Rotate: redeem a refresh token exactly once for a new pair
//! - Verify access: check a bearer token presented to a protected route
//!
//! Every store and hashing call is bounded by the configured operation
//! timeout. Hashing runs on the blocking pool. Store writes run as spawned
//! tasks, so a caller that goes away mid-request cannot leave a write half
//! applied.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use rotor_auth::{AuthConfig, InMemorySessionStore, TokenService};
//!
//! let config = AuthConfig::with_secret("0123456789abcdef0123456789abcdef");
//! let service = TokenService::from_config(&config, Arc::new(InMemorySessionStore::new()))?;
//!
//! let pair = service.issue("user-42").await?;
//! let next = service.rotate(&pair.refresh_token).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::AuthResult;
use crate::config::{AuthConfig, ConfigError};
use crate::error::{AuthError, RejectReason};
use crate::storage::SessionStore;
use crate::token::codec::{Claims, CodecError, TokenCodec};
use crate::token::hasher::SecretHasher;
use crate::types::{TokenPair, generate_session_id};

/// Longest accepted subject identifier, in bytes.
pub const MAX_SUBJECT_LEN: usize = 256;

/// Token service for issuing and rotating token pairs.
pub struct TokenService {
    /// Signs and verifies tokens.
    codec: Arc<TokenCodec>,

    /// Hashes refresh tokens for storage.
    hasher: Arc<SecretHasher>,

    /// Session storage.
    store: Arc<dyn SessionStore>,

    /// Service configuration.
    config: TokenConfig,
}

/// Configuration for the token service.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access token lifetime.
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    pub refresh_token_lifetime: Duration,

    /// Deadline for each store or hashing call.
    pub operation_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for TokenConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
            operation_timeout: config.operation_timeout,
        }
    }
}

impl TokenConfig {
    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    /// Sets the per-operation deadline.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

impl TokenService {
    /// Creates a new token service.
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        hasher: Arc<SecretHasher>,
        store: Arc<dyn SessionStore>,
        config: TokenConfig,
    ) -> Self {
        Self {
            codec,
            hasher,
            store,
            config,
        }
    }

    /// Validates `config` and builds the codec, hasher and service from it.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration is invalid.
    pub fn from_config(
        config: &AuthConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = TokenCodec::new(config.secret.as_bytes(), config.issuer.clone());
        let hasher = SecretHasher::new(&config.hashing)?;
        Ok(Self::new(
            Arc::new(codec),
            Arc::new(hasher),
            store,
            TokenConfig::from(config),
        ))
    }

    /// Returns the service configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issues a fresh token pair for `subject_id`.
    ///
    /// Any existing session for the subject is superseded, so its refresh
    /// token can no longer be redeemed.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if the subject is empty or too long
    /// - `AuthError::Internal`, `AuthError::Storage` or `AuthError::Timeout`
    ///   if signing, hashing or persisting fails
    pub async fn issue(&self, subject_id: &str) -> AuthResult<TokenPair> {
        validate_subject(subject_id)?;

        let session_id = generate_session_id();
        let pair = self.mint(subject_id, &session_id)?;
        let refresh_hash = self.hash_refresh_token(pair.refresh_token.clone()).await?;

        let store = Arc::clone(&self.store);
        let (subject, sid) = (subject_id.to_string(), session_id.clone());
        self.spawn_write("session upsert", async move {
            store.upsert_session(&subject, &sid, &refresh_hash).await
        })
        .await?;

        tracing::info!(subject_id, session_id = %session_id, "Issued session");
        Ok(pair)
    }

    /// Redeems `refresh_token` for a new token pair.
    ///
    /// The presented token is verified, matched against the subject's current
    /// session and its stored digest, then replaced with a conditional write.
    /// Of several concurrent redemptions of the same token at most one
    /// succeeds.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if the token is empty
    /// - `AuthError::Rejected` if the token is invalid, expired, stale,
    ///   already redeemed, or does not match the stored digest
    /// - `AuthError::Internal`, `AuthError::Storage` or `AuthError::Timeout`
    ///   on infrastructure failures
    pub async fn rotate(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        if refresh_token.is_empty() {
            return Err(AuthError::validation("refresh token is required"));
        }

        // 1. Verify signature and expiry
        let claims = self
            .codec
            .verify(refresh_token)
            .map_err(|e| reject_refresh(codec_reject_reason(&e), None))?;
        let Some(session_id) = claims.jti.as_deref() else {
            return Err(reject_refresh(RejectReason::InvalidToken, Some(&claims.sub)));
        };
        let subject_id = claims.sub.as_str();

        // 2. Find the session the token claims to belong to
        let record = self
            .bounded("session lookup", self.store.find_by_session_id(session_id))
            .await?
            .filter(|record| record.subject_id == subject_id)
            .ok_or_else(|| reject_refresh(RejectReason::StaleSession, Some(subject_id)))?;

        // 3. Compare against the stored digest
        if !self
            .compare_refresh_token(record.refresh_hash, refresh_token.to_string())
            .await?
        {
            return Err(reject_refresh(RejectReason::HashMismatch, Some(subject_id)));
        }

        // 4. Reissue and replace only if nobody rotated in between
        let new_session_id = generate_session_id();
        let pair = self.mint(subject_id, &new_session_id)?;
        let new_hash = self.hash_refresh_token(pair.refresh_token.clone()).await?;

        let store = Arc::clone(&self.store);
        let (subject, expected, sid) = (
            subject_id.to_string(),
            session_id.to_string(),
            new_session_id.clone(),
        );
        let replaced = self
            .spawn_write("session replace", async move {
                store
                    .replace_if_current(&subject, &expected, &sid, &new_hash)
                    .await
            })
            .await?;
        if !replaced {
            return Err(reject_refresh(RejectReason::StaleSession, Some(subject_id)));
        }

        tracing::info!(
            subject_id,
            session_id = %new_session_id,
            "Rotated session"
        );
        Ok(pair)
    }

    /// Verifies an access token presented as a bearer credential.
    ///
    /// Refresh tokens are refused here even though they carry a valid
    /// signature.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` with `TokenKind::Access`.
    pub fn verify_access(&self, access_token: &str) -> AuthResult<Claims> {
        let claims = self.codec.verify(access_token).map_err(|e| {
            let reason = codec_reject_reason(&e);
            tracing::debug!(reason = %reason, "Access token rejected");
            AuthError::rejected_access(reason)
        })?;
        if claims.jti.is_some() {
            tracing::debug!(subject_id = %claims.sub, "Refresh token presented as bearer");
            return Err(AuthError::rejected_access(RejectReason::InvalidToken));
        }
        Ok(claims)
    }

    fn mint(&self, subject_id: &str, session_id: &str) -> AuthResult<TokenPair> {
        let access_token = self
            .codec
            .sign(subject_id, None, self.config.access_token_lifetime)
            .map_err(|e| AuthError::internal(format!("failed to sign access token: {e}")))?;
        let refresh_token = self
            .codec
            .sign(
                subject_id,
                Some(session_id),
                self.config.refresh_token_lifetime,
            )
            .map_err(|e| AuthError::internal(format!("failed to sign refresh token: {e}")))?;

        Ok(TokenPair::bearer(
            access_token,
            refresh_token,
            self.config.access_token_lifetime.as_secs(),
        ))
    }

    async fn hash_refresh_token(&self, raw: String) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        self.bounded("refresh token hashing", async move {
            tokio::task::spawn_blocking(move || hasher.hash(&raw))
                .await
                .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
                .map_err(|e| AuthError::internal(format!("failed to hash refresh token: {e}")))
        })
        .await
    }

    async fn compare_refresh_token(&self, digest: String, raw: String) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        self.bounded("refresh token comparison", async move {
            tokio::task::spawn_blocking(move || hasher.compare(&digest, &raw))
                .await
                .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))
        })
        .await
    }

    /// Runs a store write as its own task and waits for it within the deadline.
    ///
    /// The task keeps running if the caller is dropped or the deadline passes.
    async fn spawn_write<T, F>(&self, operation: &'static str, write: F) -> AuthResult<T>
    where
        T: Send + 'static,
        F: Future<Output = AuthResult<T>> + Send + 'static,
    {
        let handle = tokio::spawn(write);
        self.bounded(operation, async move {
            handle
                .await
                .map_err(|e| AuthError::internal(format!("{operation} task failed: {e}")))?
        })
        .await
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        match tokio::time::timeout(self.config.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.config.operation_timeout.as_millis() as u64,
                    "Operation timed out"
                );
                Err(AuthError::timeout(operation))
            }
        }
    }
}

fn validate_subject(subject_id: &str) -> AuthResult<()> {
    if subject_id.trim().is_empty() {
        return Err(AuthError::validation("subject_id is required"));
    }
    if subject_id.len() > MAX_SUBJECT_LEN {
        return Err(AuthError::validation(format!(
            "subject_id must be at most {MAX_SUBJECT_LEN} bytes"
        )));
    }
    Ok(())
}

fn codec_reject_reason(err: &CodecError) -> RejectReason {
    match err {
        CodecError::Expired => RejectReason::Expired,
        _ => RejectReason::InvalidToken,
    }
}

fn reject_refresh(reason: RejectReason, subject_id: Option<&str>) -> AuthError {
    tracing::warn!(
        reason = %reason,
        subject_id = subject_id.unwrap_or("-"),
        "Refresh token rejected"
    );
    AuthError::rejected_refresh(reason)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::HashingConfig;
    use crate::storage::InMemorySessionStore;
    use crate::types::SessionRecord;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn test_hasher() -> SecretHasher {
        SecretHasher::new(&HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    fn service_with(store: Arc<dyn SessionStore>, config: TokenConfig) -> TokenService {
        TokenService::new(
            Arc::new(TokenCodec::new(SECRET, "rotor-test")),
            Arc::new(test_hasher()),
            store,
            config,
        )
    }

    fn service() -> (TokenService, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let service = service_with(store.clone(), TokenConfig::default());
        (service, store)
    }

    fn session_of(service: &TokenService, refresh_token: &str) -> String {
        service
            .codec
            .verify(refresh_token)
            .unwrap()
            .jti
            .unwrap()
    }

    fn flip_signature_char(token: &str) -> String {
        let sig_start = token.rfind('.').unwrap() + 1;
        let idx = sig_start + (token.len() - sig_start) / 2;
        let replacement = if token.as_bytes()[idx] == b'A' { "B" } else { "A" };
        let mut tampered = token.to_string();
        tampered.replace_range(idx..=idx, replacement);
        tampered
    }

    #[tokio::test]
    async fn test_issue_and_rotate_scenario() {
        let (service, store) = service();

        let first = service.issue("user-42").await.unwrap();
        assert_eq!(first.token_type, "Bearer");
        assert_eq!(first.expires_in, 900);
        assert_ne!(first.access_token, first.refresh_token);

        let second = service.rotate(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let replay = service.rotate(&first.refresh_token).await.unwrap_err();
        assert_eq!(replay.reject_reason(), Some(RejectReason::StaleSession));

        let third = service.rotate(&second.refresh_token).await.unwrap();
        let record = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(record.session_id, session_of(&service, &third.refresh_token));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_carries_subject_forward() {
        let (service, _) = service();
        let first = service.issue("user-42").await.unwrap();
        let second = service.rotate(&first.refresh_token).await.unwrap();

        let access = service.verify_access(&second.access_token).unwrap();
        assert_eq!(access.sub, "user-42");
        let refresh = service.codec.verify(&second.refresh_token).unwrap();
        assert_eq!(refresh.sub, "user-42");
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_subject() {
        let (service, store) = service();

        let err = service.issue("").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));

        let err = service.issue("   ").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));

        let err = service
            .issue(&"x".repeat(MAX_SUBJECT_LEN + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_second_issue_supersedes_first() {
        let (service, _) = service();

        let first = service.issue("user-42").await.unwrap();
        let second = service.issue("user-42").await.unwrap();

        let err = service.rotate(&first.refresh_token).await.unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::StaleSession));
        assert!(service.rotate(&second.refresh_token).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_single_winner() {
        let (service, store) = service();
        let pair = service.issue("user-42").await.unwrap();

        let (a, b) = tokio::join!(
            service.rotate(&pair.refresh_token),
            service.rotate(&pair.refresh_token)
        );

        let (winner, loser) = match (a, b) {
            (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
            (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
        };
        assert!(loser.is_rejection());

        let record = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(record.session_id, session_of(&service, &winner.refresh_token));
    }

    #[tokio::test]
    async fn test_tampered_token_leaves_store_unchanged() {
        let (service, store) = service();
        let pair = service.issue("user-42").await.unwrap();
        let before = store.find_by_subject("user-42").await.unwrap().unwrap();

        let err = service
            .rotate(&flip_signature_char(&pair.refresh_token))
            .await
            .unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::InvalidToken));
        assert_eq!(err.to_string(), "Invalid refresh token");

        let after = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(before, after);
        assert!(service.rotate(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_refresh_token_rejected() {
        let (service, _) = service();
        let pair = service.issue("user-42").await.unwrap();
        let sid = session_of(&service, &pair.refresh_token);

        let expired = service
            .codec
            .sign_at("user-42", Some(&sid), Duration::from_secs(60), 1_000)
            .unwrap();

        let err = service.rotate(&expired).await.unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::Expired));
    }

    #[tokio::test]
    async fn test_access_token_cannot_rotate() {
        let (service, _) = service();
        let pair = service.issue("user-42").await.unwrap();

        let err = service.rotate(&pair.access_token).await.unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::InvalidToken));
    }

    #[tokio::test]
    async fn test_forged_token_with_live_session_id_is_hash_mismatch() {
        let (service, store) = service();
        let pair = service.issue("user-42").await.unwrap();
        let sid = session_of(&service, &pair.refresh_token);
        let now = time::OffsetDateTime::now_utc().unix_timestamp();

        let other = service
            .codec
            .sign_at("user-42", Some(&sid), Duration::from_secs(3600), now - 5)
            .unwrap();
        assert_ne!(other, pair.refresh_token);

        let err = service.rotate(&other).await.unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::HashMismatch));
        let record = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(record.session_id, sid);
    }

    #[tokio::test]
    async fn test_session_of_other_subject_is_stale() {
        let (service, _) = service();
        let pair = service.issue("user-42").await.unwrap();
        let sid = session_of(&service, &pair.refresh_token);

        let cross = service
            .codec
            .sign("user-7", Some(&sid), Duration::from_secs(3600))
            .unwrap();

        let err = service.rotate(&cross).await.unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::StaleSession));
    }

    #[tokio::test]
    async fn test_empty_refresh_token_is_validation_error() {
        let (service, _) = service();
        let err = service.rotate("").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_verify_access() {
        let (service, _) = service();
        let pair = service.issue("user-42").await.unwrap();

        let claims = service.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "user-42");
        assert!(claims.jti.is_none());

        let err = service.verify_access(&pair.refresh_token).unwrap_err();
        assert_eq!(err.to_string(), "Invalid access token");

        let err = service.verify_access("garbage").unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::InvalidToken));
    }

    #[tokio::test]
    async fn test_from_config_validates() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        assert!(TokenService::from_config(&AuthConfig::default(), store.clone()).is_err());

        let mut config = AuthConfig::with_secret("0123456789abcdef0123456789abcdef");
        config.hashing.memory_kib = 1024;
        config.hashing.iterations = 1;
        let service = TokenService::from_config(&config, store).unwrap();
        assert_eq!(service.config().access_token_lifetime, Duration::from_secs(900));
    }

    /// Store whose every call stalls past any reasonable deadline.
    struct StalledStore;

    #[async_trait]
    impl SessionStore for StalledStore {
        async fn upsert_session(&self, _: &str, _: &str, _: &str) -> AuthResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn find_by_subject(&self, _: &str) -> AuthResult<Option<SessionRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn find_by_session_id(&self, _: &str) -> AuthResult<Option<SessionRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn replace_if_current(&self, _: &str, _: &str, _: &str, _: &str) -> AuthResult<bool> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(false)
        }
    }

    /// Store that always fails.
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn upsert_session(&self, _: &str, _: &str, _: &str) -> AuthResult<()> {
            Err(AuthError::storage("connection refused"))
        }

        async fn find_by_subject(&self, _: &str) -> AuthResult<Option<SessionRecord>> {
            Err(AuthError::storage("connection refused"))
        }

        async fn find_by_session_id(&self, _: &str) -> AuthResult<Option<SessionRecord>> {
            Err(AuthError::storage("connection refused"))
        }

        async fn replace_if_current(&self, _: &str, _: &str, _: &str, _: &str) -> AuthResult<bool> {
            Err(AuthError::storage("connection refused"))
        }
    }

    /// Store whose writes announce themselves, pause, then land in memory.
    struct SlowWriteStore {
        inner: InMemorySessionStore,
        delay: Duration,
        started: tokio::sync::mpsc::UnboundedSender<()>,
    }

    impl SlowWriteStore {
        fn new(delay: Duration, started: tokio::sync::mpsc::UnboundedSender<()>) -> Self {
            Self {
                inner: InMemorySessionStore::new(),
                delay,
                started,
            }
        }
    }

    #[async_trait]
    impl SessionStore for SlowWriteStore {
        async fn upsert_session(
            &self,
            subject_id: &str,
            session_id: &str,
            refresh_hash: &str,
        ) -> AuthResult<()> {
            let _ = self.started.send(());
            tokio::time::sleep(self.delay).await;
            self.inner
                .upsert_session(subject_id, session_id, refresh_hash)
                .await
        }

        async fn find_by_subject(&self, subject_id: &str) -> AuthResult<Option<SessionRecord>> {
            self.inner.find_by_subject(subject_id).await
        }

        async fn find_by_session_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
            self.inner.find_by_session_id(session_id).await
        }

        async fn replace_if_current(
            &self,
            subject_id: &str,
            expected_session_id: &str,
            new_session_id: &str,
            new_refresh_hash: &str,
        ) -> AuthResult<bool> {
            let _ = self.started.send(());
            tokio::time::sleep(self.delay).await;
            self.inner
                .replace_if_current(
                    subject_id,
                    expected_session_id,
                    new_session_id,
                    new_refresh_hash,
                )
                .await
        }
    }

    #[tokio::test]
    async fn test_write_lands_after_caller_times_out() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let store = Arc::new(SlowWriteStore::new(Duration::from_millis(300), tx));
        let config = TokenConfig::default().with_operation_timeout(Duration::from_millis(100));
        let service = service_with(store.clone(), config);

        let err = service.issue("user-42").await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout { .. }));
        assert!(store.inner.find_by_subject("user-42").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let record = store.inner.find_by_subject("user-42").await.unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn test_dropped_rotation_still_lands() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let store = Arc::new(SlowWriteStore::new(Duration::from_millis(200), tx));
        let service = Arc::new(service_with(store.clone(), TokenConfig::default()));

        let pair = service.issue("user-42").await.unwrap();
        rx.recv().await.unwrap();
        let before = store.inner.find_by_subject("user-42").await.unwrap().unwrap();

        let task = tokio::spawn({
            let service = Arc::clone(&service);
            let token = pair.refresh_token.clone();
            async move { service.rotate(&token).await }
        });

        // Abort the caller once the replace has started
        rx.recv().await.unwrap();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let after = store.inner.find_by_subject("user-42").await.unwrap().unwrap();
        assert_ne!(after.session_id, before.session_id);
        assert_ne!(after.refresh_hash, before.refresh_hash);

        let err = service.rotate(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::StaleSession));
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let config = TokenConfig::default().with_operation_timeout(Duration::from_millis(100));
        let service = service_with(Arc::new(StalledStore), config);

        let err = service.issue("user-42").await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout { .. }));
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let service = service_with(Arc::new(BrokenStore), TokenConfig::default());

        let err = service.issue("user-42").await.unwrap_err();
        assert!(matches!(err, AuthError::Storage { .. }));

        let token = service
            .codec
            .sign("user-42", Some("s1"), Duration::from_secs(60))
            .unwrap();
        let err = service.rotate(&token).await.unwrap_err();
        assert!(err.is_server_error());
        assert!(err.reject_reason().is_none());
    }
}
