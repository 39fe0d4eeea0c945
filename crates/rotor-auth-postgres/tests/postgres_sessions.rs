//! PostgreSQL session store tests.
//!
//! Skipped unless `ROTOR_TEST_DATABASE_URL` points at a disposable database.

use std::sync::Arc;

use rotor_auth::{
    AuthConfig, RejectReason, SessionStore, TokenService, config::HashingConfig,
};
use rotor_auth_postgres::PostgresSessionStore;

async fn connect() -> Option<PostgresSessionStore> {
    let url = match std::env::var("ROTOR_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("ROTOR_TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };
    let store = PostgresSessionStore::connect(&url)
        .await
        .expect("connect to test database");
    store.ensure_schema().await.expect("create session schema");
    Some(store)
}

fn subject() -> String {
    format!("subject-{}", uuid::Uuid::new_v4())
}

fn sid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
async fn upsert_then_find() {
    let Some(store) = connect().await else { return };
    let subject = subject();
    let s1 = sid();

    store.upsert_session(&subject, &s1, "h1").await.unwrap();

    let by_subject = store.find_by_subject(&subject).await.unwrap().unwrap();
    assert_eq!(by_subject.session_id, s1);
    assert_eq!(by_subject.refresh_hash, "h1");

    let by_session = store.find_by_session_id(&s1).await.unwrap().unwrap();
    assert_eq!(by_session.subject_id, subject);

    assert!(store.find_by_session_id(&sid()).await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_overwrites_in_place() {
    let Some(store) = connect().await else { return };
    let subject = subject();
    let (s1, s2) = (sid(), sid());

    store.upsert_session(&subject, &s1, "h1").await.unwrap();
    let first = store.find_by_subject(&subject).await.unwrap().unwrap();
    store.upsert_session(&subject, &s2, "h2").await.unwrap();

    assert!(store.find_by_session_id(&s1).await.unwrap().is_none());
    let current = store.find_by_subject(&subject).await.unwrap().unwrap();
    assert_eq!(current.session_id, s2);
    assert_eq!(current.created_at, first.created_at);
}

#[tokio::test]
async fn replace_requires_current_session() {
    let Some(store) = connect().await else { return };
    let subject = subject();
    let (s1, s2, s3) = (sid(), sid(), sid());

    store.upsert_session(&subject, &s1, "h1").await.unwrap();

    assert!(store.replace_if_current(&subject, &s1, &s2, "h2").await.unwrap());
    assert!(!store.replace_if_current(&subject, &s1, &s3, "h3").await.unwrap());
    assert!(
        !store
            .replace_if_current(&self::subject(), &s2, &s3, "h3")
            .await
            .unwrap()
    );

    let record = store.find_by_subject(&subject).await.unwrap().unwrap();
    assert_eq!(record.session_id, s2);
    assert_eq!(record.refresh_hash, "h2");
}

#[tokio::test]
async fn concurrent_rotation_single_winner() {
    let Some(store) = connect().await else { return };
    let store = Arc::new(store);

    let mut config = AuthConfig::with_secret("0123456789abcdef0123456789abcdef");
    config.hashing = HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    let service = TokenService::from_config(&config, store.clone()).unwrap();

    let subject = subject();
    let pair = service.issue(&subject).await.unwrap();

    let (a, b) = tokio::join!(
        service.rotate(&pair.refresh_token),
        service.rotate(&pair.refresh_token)
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let loser = a.err().or(b.err()).unwrap();
    assert_eq!(loser.reject_reason(), Some(RejectReason::StaleSession));

    let replay = service.rotate(&pair.refresh_token).await.unwrap_err();
    assert!(replay.is_rejection());
}
