use async_trait::async_trait;
use chrono::{DateTime, Utc};
use match_cache::{cache_key, Cache, CacheEntry, CacheError, CacheStatus, CacheStore, ManualClock, MemoryStore, SqliteStore};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Feed {
    total: usize,
    label: String,
}

const TTL: Duration = Duration::from_secs(3600);

fn cache_with_clock() -> (Cache, Arc<ManualClock>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    (Cache::with_clock(store.clone(), clock.clone()), clock, store)
}

async fn produce(cache: &Cache, key: &str, calls: &AtomicUsize, bypass: bool) -> (Feed, CacheStatus) {
    cache
        .get_cached(key, TTL, bypass, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok::<_, String>(Feed { total: n, label: format!("run {n}") })
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn hit_within_ttl_and_miss_after_expiry() {
    let (cache, clock, _) = cache_with_clock();
    let calls = AtomicUsize::new(0);
    let key = cache_key("team-matches", &["2", "Sentinels", "90"]);

    let (first, status) = produce(&cache, &key, &calls, false).await;
    assert_eq!(status, CacheStatus::Miss);

    clock.advance(Duration::from_secs(3599));
    let (second, status) = produce(&cache, &key, &calls, false).await;
    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(second, first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(1));
    let (third, status) = produce(&cache, &key, &calls, false).await;
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(third.total, 2);
}

#[tokio::test]
async fn bypass_neither_reads_nor_writes() {
    let (cache, _, store) = cache_with_clock();
    let calls = AtomicUsize::new(0);

    let (_, status) = produce(&cache, "k", &calls, true).await;
    assert_eq!(status, CacheStatus::Bypass);
    assert!(store.is_empty().await);

    produce(&cache, "k", &calls, false).await;
    let (value, status) = produce(&cache, "k", &calls, true).await;
    assert_eq!(status, CacheStatus::Bypass);
    assert_eq!(value.total, 3);

    let (cached, _) = produce(&cache, "k", &calls, false).await;
    assert_eq!(cached.total, 2);
}

#[tokio::test]
async fn invalidate_forces_next_call_to_produce() {
    let (cache, _, _) = cache_with_clock();
    let calls = AtomicUsize::new(0);

    produce(&cache, "k", &calls, false).await;
    assert!(cache.invalidate("k").await);
    assert!(!cache.invalidate("k").await);

    let (_, status) = produce(&cache, "k", &calls, false).await;
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn producer_error_is_not_cached() {
    let (cache, _, store) = cache_with_clock();
    let result = cache
        .get_cached("k", TTL, false, || async { Err::<Feed, _>("upstream 503".to_string()) })
        .await;
    assert_eq!(result.unwrap_err(), "upstream 503");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn concurrent_misses_run_producer_once() {
    let (cache, _, _) = cache_with_clock();
    let cache = Arc::new(cache);
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_cached("team-matches:2:sentinels", TTL, false, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, String>(Feed { total: 50, label: "once".to_string() })
                })
                .await
                .unwrap()
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        let (feed, status) = handle.await.unwrap();
        assert_eq!(feed.total, 50);
        statuses.push(status);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(statuses.iter().filter(|s| **s == CacheStatus::Miss).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == CacheStatus::Hit).count(), 7);
}

struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> match_cache::Result<Option<CacheEntry>> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
    async fn put(&self, _entry: CacheEntry) -> match_cache::Result<()> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
    async fn remove(&self, _key: &str) -> match_cache::Result<bool> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
    async fn purge_expired(&self, _now: DateTime<Utc>) -> match_cache::Result<usize> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn broken_store_fails_open() {
    let cache = Cache::new(Arc::new(BrokenStore));
    let calls = AtomicUsize::new(0);

    let (_, status) = produce(&cache, "k", &calls, false).await;
    assert_eq!(status, CacheStatus::FailOpen);
    let (_, status) = produce(&cache, "k", &calls, false).await;
    assert_eq!(status, CacheStatus::FailOpen);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(!cache.invalidate("k").await);
    assert!(cache.purge_expired().await.is_err());
}

#[tokio::test]
async fn sqlite_backed_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("vod_cache.db")).unwrap());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = Cache::with_clock(store, clock.clone());
    let calls = AtomicUsize::new(0);

    produce(&cache, "player-matches:9:tenz", &calls, false).await;
    let (_, status) = produce(&cache, "player-matches:9:tenz", &calls, false).await;
    assert_eq!(status, CacheStatus::Hit);

    clock.advance(Duration::from_secs(7200));
    assert_eq!(cache.purge_expired().await.unwrap(), 1);
    let (_, status) = produce(&cache, "player-matches:9:tenz", &calls, false).await;
    assert_eq!(status, CacheStatus::Miss);
}
