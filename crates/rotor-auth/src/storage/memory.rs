//! In-memory session store.
//!
//! Sessions are keyed by subject in a [`DashMap`], with a secondary index from
//! session id to subject. Writers update the index while holding the
//! subject's shard lock; readers never hold both at once.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::AuthResult;
use crate::storage::SessionStore;
use crate::types::SessionRecord;

/// Process-local [`SessionStore`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
    by_session: DashMap<String, String>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subjects with a session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn upsert_session(
        &self,
        subject_id: &str,
        session_id: &str,
        refresh_hash: &str,
    ) -> AuthResult<()> {
        match self.sessions.entry(subject_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                self.by_session.remove(&record.session_id);
                record.rotate(session_id, refresh_hash);
                self.by_session
                    .insert(session_id.to_string(), subject_id.to_string());
            }
            Entry::Vacant(vacant) => {
                self.by_session
                    .insert(session_id.to_string(), subject_id.to_string());
                vacant.insert(SessionRecord::new(subject_id, session_id, refresh_hash));
            }
        }
        Ok(())
    }

    async fn find_by_subject(&self, subject_id: &str) -> AuthResult<Option<SessionRecord>> {
        Ok(self.sessions.get(subject_id).map(|r| r.value().clone()))
    }

    async fn find_by_session_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        let Some(subject_id) = self.by_session.get(session_id).map(|s| s.value().clone()) else {
            return Ok(None);
        };
        Ok(self
            .sessions
            .get(&subject_id)
            .filter(|r| r.session_id == session_id)
            .map(|r| r.value().clone()))
    }

    async fn replace_if_current(
        &self,
        subject_id: &str,
        expected_session_id: &str,
        new_session_id: &str,
        new_refresh_hash: &str,
    ) -> AuthResult<bool> {
        let Some(mut record) = self.sessions.get_mut(subject_id) else {
            return Ok(false);
        };
        if record.session_id != expected_session_id {
            return Ok(false);
        }

        self.by_session.remove(expected_session_id);
        record.rotate(new_session_id, new_refresh_hash);
        self.by_session
            .insert(new_session_id.to_string(), subject_id.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_upsert_and_find() {
        let store = InMemorySessionStore::new();
        store.upsert_session("user-42", "s1", "h1").await.unwrap();

        let by_subject = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(by_subject.session_id, "s1");
        assert_eq!(by_subject.refresh_hash, "h1");

        let by_session = store.find_by_session_id("s1").await.unwrap().unwrap();
        assert_eq!(by_session, by_subject);

        assert!(store.find_by_subject("nobody").await.unwrap().is_none());
        assert!(store.find_by_session_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_supersedes_previous_session() {
        let store = InMemorySessionStore::new();
        store.upsert_session("user-42", "s1", "h1").await.unwrap();
        let first = store.find_by_subject("user-42").await.unwrap().unwrap();

        store.upsert_session("user-42", "s2", "h2").await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.find_by_session_id("s1").await.unwrap().is_none());
        let current = store.find_by_session_id("s2").await.unwrap().unwrap();
        assert_eq!(current.refresh_hash, "h2");
        assert_eq!(current.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_replace_if_current() {
        let store = InMemorySessionStore::new();
        store.upsert_session("user-42", "s1", "h1").await.unwrap();

        assert!(
            store
                .replace_if_current("user-42", "s1", "s2", "h2")
                .await
                .unwrap()
        );
        assert!(
            !store
                .replace_if_current("user-42", "s1", "s3", "h3")
                .await
                .unwrap()
        );

        let record = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(record.session_id, "s2");
        assert_eq!(record.refresh_hash, "h2");
        assert!(store.find_by_session_id("s1").await.unwrap().is_none());
        assert!(store.find_by_session_id("s3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_unknown_subject() {
        let store = InMemorySessionStore::new();
        assert!(
            !store
                .replace_if_current("ghost", "s1", "s2", "h2")
                .await
                .unwrap()
        );
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replace_single_winner() {
        let store = Arc::new(InMemorySessionStore::new());
        store.upsert_session("user-42", "s0", "h0").await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .replace_if_current("user-42", "s0", &format!("n{i}"), "h")
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let record = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert!(record.session_id.starts_with('n'));
        assert!(
            store
                .find_by_session_id(&record.session_id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_index_in_step() {
        let store = Arc::new(InMemorySessionStore::new());

        for round in 0..50 {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store
                            .upsert_session("user-42", &format!("r{round}-s{i}"), "h")
                            .await
                            .unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.by_session.len(), 1);
        let record = store.find_by_subject("user-42").await.unwrap().unwrap();
        assert_eq!(
            store.by_session.get(&record.session_id).unwrap().value(),
            "user-42"
        );
    }
}
