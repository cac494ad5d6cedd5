mod common;

use std::{sync::Arc, time::Duration};

use common::FailingStore;
use dashtune::{
    management::{
        ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, FileStore, KeyValueStore, MemoryStore,
        REFRESH_TOKEN_KEY, TokenStore,
    },
    utils::ManualClock,
};

fn token_store() -> (TokenStore, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (TokenStore::new(store.clone(), clock.clone()), store, clock)
}

#[tokio::test]
async fn access_token_valid_until_expiry() {
    let (tokens, _, clock) = token_store();
    assert!(tokens.save("access", "refresh", 3600).await);

    assert_eq!(
        tokens.get_access_token_if_valid().await.as_deref(),
        Some("access")
    );

    clock.advance(Duration::from_secs(3599));
    assert_eq!(
        tokens.get_access_token_if_valid().await.as_deref(),
        Some("access")
    );

    clock.advance(Duration::from_secs(2));
    assert_eq!(tokens.get_access_token_if_valid().await, None);
    assert_eq!(tokens.get_refresh_token().await.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn token_is_expired_exactly_at_expiry() {
    let (tokens, _, clock) = token_store();
    tokens.save("access", "refresh", 10).await;

    clock.advance(Duration::from_secs(10));
    assert_eq!(tokens.get_access_token_if_valid().await, None);
}

#[tokio::test]
async fn zero_lifetime_is_immediately_expired() {
    let (tokens, _, _) = token_store();
    tokens.save("access", "refresh", 0).await;
    assert_eq!(tokens.get_access_token_if_valid().await, None);
}

#[tokio::test]
async fn save_writes_absolute_expiry() {
    let (tokens, store, _) = token_store();
    tokens.save("a", "r", 60).await;

    assert_eq!(
        store.get(EXPIRES_AT_KEY).await.unwrap().as_deref(),
        Some("1700000060000")
    );
    assert_eq!(tokens.expires_at().await, Some(1_700_000_060_000));
}

#[tokio::test]
async fn clear_removes_all_three_keys() {
    let (tokens, store, _) = token_store();
    tokens.save("a", "r", 60).await;
    assert!(tokens.has_session().await);

    tokens.clear().await;

    assert!(!store.contains(ACCESS_TOKEN_KEY));
    assert!(!store.contains(REFRESH_TOKEN_KEY));
    assert!(!store.contains(EXPIRES_AT_KEY));
    assert!(!tokens.has_session().await);
}

#[tokio::test]
async fn malformed_expiry_reads_as_expired() {
    let (tokens, store, _) = token_store();
    tokens.save("a", "r", 3600).await;
    store.set(EXPIRES_AT_KEY, "soon".to_string()).await.unwrap();

    assert_eq!(tokens.get_access_token_if_valid().await, None);
}

#[tokio::test]
async fn empty_refresh_token_is_no_session() {
    let (tokens, _, _) = token_store();
    tokens.save("a", "", 3600).await;

    assert_eq!(tokens.get_refresh_token().await, None);
    assert!(!tokens.has_session().await);
}

#[tokio::test]
async fn unavailable_storage_reads_as_absent() {
    let tokens = TokenStore::new(Arc::new(FailingStore), Arc::new(ManualClock::new(0)));

    assert!(!tokens.save("a", "r", 3600).await);
    assert_eq!(tokens.get_access_token_if_valid().await, None);
    assert_eq!(tokens.get_refresh_token().await, None);
    assert!(!tokens.has_session().await);
    // must not panic
    tokens.clear().await;
}

#[tokio::test]
async fn huge_lifetime_saturates_instead_of_overflowing() {
    let (tokens, _, clock) = token_store();

    assert!(tokens.save("a", "r", 10_000_000_000_000_000).await);
    assert_eq!(tokens.expires_at().await, Some(i64::MAX));
    assert_eq!(tokens.get_access_token_if_valid().await.as_deref(), Some("a"));

    assert!(tokens.save("b", "r", u64::MAX).await);
    clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert_eq!(tokens.get_access_token_if_valid().await.as_deref(), Some("b"));
}

#[tokio::test]
async fn corrupt_store_file_does_not_block_login() {
    let mut path = std::env::temp_dir();
    path.push(format!("dashtune-tokens-corrupt-{}", std::process::id()));
    std::fs::create_dir_all(&path).unwrap();
    path.push("store.json");
    std::fs::write(&path, "{\"spotify_access_token\": \"trunc").unwrap();

    let tokens = TokenStore::new(
        Arc::new(FileStore::new(path.clone())),
        Arc::new(ManualClock::new(0)),
    );
    assert!(!tokens.has_session().await);

    assert!(tokens.save("a", "r", 3600).await);
    assert_eq!(tokens.get_access_token_if_valid().await.as_deref(), Some("a"));
    assert!(tokens.has_session().await);

    let _ = std::fs::remove_file(&path);
}
