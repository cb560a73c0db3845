use super::local_backend::matches_pattern;
use super::{KvBackend, LocalBackend, RedisBackend};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

fn redis_test_pool() -> Option<deadpool_redis::Pool> {
    let url = env::var("OPRELAY_REDIS_TEST_URL").ok()?;
    utils::connector::create_redis_pool_from_url(&url)
}

async fn exercise_backend(backend: &dyn KvBackend, prefix: &str) {
    let a = format!("{prefix}:ops:a");
    let b = format!("{prefix}:ops:b");
    let other = format!("{prefix}:other:c");

    assert_eq!(backend.get(&a).await.expect("get should succeed"), None);

    backend.set(&a, b"one").await.expect("set should succeed");
    backend.set(&b, b"two").await.expect("set should succeed");
    backend.set(&other, b"three").await.expect("set should succeed");
    backend.set(&a, b"uno").await.expect("overwrite should succeed");

    assert_eq!(backend.get(&a).await.unwrap(), Some(b"uno".to_vec()));

    let mut keys = backend
        .keys(&format!("{prefix}:ops:*"))
        .await
        .expect("scan should succeed");
    keys.sort();
    assert_eq!(keys, vec![a.clone(), b.clone()]);

    assert!(backend.del(&a).await.unwrap());
    assert!(!backend.del(&a).await.unwrap());
    assert_eq!(backend.get(&a).await.unwrap(), None);

    backend.ping().await.expect("ping should succeed");

    let _ = backend.del(&b).await;
    let _ = backend.del(&other).await;
}

#[tokio::test]
async fn local_backend_kv_roundtrip() {
    let backend = LocalBackend::new();
    exercise_backend(&backend, "local").await;
}

#[test]
fn pattern_matching() {
    assert!(matches_pattern("operations:u1:abc", "operations:u1:*"));
    assert!(!matches_pattern("operations:u2:abc", "operations:u1:*"));
    assert!(matches_pattern("exact", "exact"));
    assert!(!matches_pattern("exactly", "exact"));
}

#[tokio::test]
async fn redis_backend_kv_roundtrip() {
    let Some(pool) = redis_test_pool() else {
        eprintln!("OPRELAY_REDIS_TEST_URL not set, skipping redis backend test");
        return;
    };
    let backend = RedisBackend::new(pool);
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    exercise_backend(&backend, &format!("oprelay-test:{nonce}")).await;
}
