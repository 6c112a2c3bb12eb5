//! Tests against a live Redis server.
//!
//! Skipped unless `GOOSEBIN_TEST_REDIS` names a server, e.g.
//! `GOOSEBIN_TEST_REDIS=127.0.0.1:6379 cargo test -p pastekv`.
//! Each run uses fresh content so reruns do not collide with old records.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pastekv::{
    BackendError, KvBackend, LoadResult, PasteEngine, PastePolicy, RedisBackend, RedisConfig,
    RetryPolicy, StoreResult,
};
use tokio_util::sync::CancellationToken;

fn redis_from_env() -> Option<RedisBackend> {
    let addr = std::env::var("GOOSEBIN_TEST_REDIS").ok()?;
    let (host, port) = addr.rsplit_once(':')?;
    let config = RedisConfig::new(host, port.parse().ok()?)
        .with_pool_size(4)
        .with_retry(RetryPolicy::default().with_max_retries(Some(3)));
    RedisBackend::new(config).ok()
}

fn unique_content(label: &str) -> Vec<u8> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{label} {nanos}").into_bytes()
}

#[tokio::test]
async fn test_store_load_roundtrip() {
    let Some(backend) = redis_from_env() else {
        eprintln!("GOOSEBIN_TEST_REDIS not set, skipping");
        return;
    };
    let engine = PasteEngine::new(
        Arc::new(backend),
        PastePolicy {
            ttl: Duration::from_secs(60),
            size_limit: 65535,
        },
    );
    let cancel = CancellationToken::new();
    let content = unique_content("roundtrip");

    let key = match engine.store(&content, &cancel).await {
        StoreResult::Created(key) => key,
        other => panic!("expected Created, got {other:?}"),
    };
    assert_eq!(engine.store(&content, &cancel).await, StoreResult::AlreadyExists(key));

    match engine.load(&key.encode(), &cancel).await {
        LoadResult::Found {
            content: stored,
            remaining_ttl,
        } => {
            assert_eq!(stored, content);
            assert!(remaining_ttl <= Duration::from_secs(60));
            assert!(remaining_ttl > Duration::from_secs(50));
        }
        other => panic!("expected Found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_short_ttl_expires() {
    let Some(backend) = redis_from_env() else {
        eprintln!("GOOSEBIN_TEST_REDIS not set, skipping");
        return;
    };
    let cancel = CancellationToken::new();
    let key = format!("paste/test-{}", String::from_utf8_lossy(&unique_content("expiry")));

    backend
        .conditional_insert(&key, b"short", Duration::from_millis(200), &cancel)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(
        backend.get_with_remaining_ttl(&key, &cancel).await,
        Ok(pastekv::GetOutcome::NotFound)
    );
}

#[tokio::test]
async fn test_ping_and_close() {
    let Some(backend) = redis_from_env() else {
        eprintln!("GOOSEBIN_TEST_REDIS not set, skipping");
        return;
    };
    let cancel = CancellationToken::new();

    assert_eq!(backend.ping(&cancel).await, Ok(()));
    backend.close().await;
    assert_eq!(backend.ping(&cancel).await, Err(BackendError::Closed));
}
