use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoffice_config::CacheBackend;
use backoffice_services::cache::{
    CacheError, CacheKey, CachedList, MemoryListCache, NoopListCache,
};
use backoffice_services::{ListCache, ListQuery, ResourceKind, build_cache};
use bson::{Document, doc};
use mongodb::Database;
use serde_json::json;

use crate::fixtures::test_app::{TestApp, test_settings};

fn list(names: &[&str]) -> CachedList {
    CachedList {
        records: names.iter().map(|name| doc! { "name": *name }).collect(),
        count: names.len() as u64,
    }
}

const TTL: Duration = Duration::from_secs(60);

/// Stores at whatever generation the resource is currently at.
async fn store(cache: &MemoryListCache, key: &CacheKey, list: CachedList, ttl: Duration) -> bool {
    let generation = cache.generation(&key.resource).await.unwrap();
    cache.set(key, list, ttl, generation).await.unwrap()
}

#[tokio::test]
async fn stored_list_is_returned() {
    let cache = MemoryListCache::new(10);
    let key = CacheKey::new("tag", "shape-a");

    assert_eq!(cache.get(&key).await.unwrap(), None);
    assert!(store(&cache, &key, list(&["red", "blue"]), TTL).await);

    assert_eq!(cache.get(&key).await.unwrap(), Some(list(&["red", "blue"])));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn shapes_are_cached_independently() {
    let cache = MemoryListCache::new(10);
    let by_name = CacheKey::new("tag", "by-name");
    let by_color = CacheKey::new("tag", "by-color");

    store(&cache, &by_name, list(&["a"]), TTL).await;

    assert!(cache.get(&by_name).await.unwrap().is_some());
    assert!(cache.get(&by_color).await.unwrap().is_none());
}

#[tokio::test]
async fn invalidate_drops_every_shape_of_one_resource() {
    let cache = MemoryListCache::new(10);
    store(&cache, &CacheKey::new("tag", "one"), list(&["a"]), TTL).await;
    store(&cache, &CacheKey::new("tag", "two"), list(&["b"]), TTL).await;
    store(&cache, &CacheKey::new("menu", "one"), list(&["c"]), TTL).await;

    cache.invalidate("tag").await.unwrap();

    assert!(cache.get(&CacheKey::new("tag", "one")).await.unwrap().is_none());
    assert!(cache.get(&CacheKey::new("tag", "two")).await.unwrap().is_none());
    assert!(cache.get(&CacheKey::new("menu", "one")).await.unwrap().is_some());
}

#[tokio::test]
async fn snapshot_read_before_an_invalidation_is_not_stored() {
    let cache = MemoryListCache::new(10);
    let key = CacheKey::new("tag", "all");

    let read_at = cache.generation("tag").await.unwrap();
    // A mutation lands while the store read is in flight
    cache.invalidate("tag").await.unwrap();

    assert!(!cache.set(&key, list(&["old"]), TTL, read_at).await.unwrap());
    assert_eq!(cache.get(&key).await.unwrap(), None);

    let current = cache.generation("tag").await.unwrap();
    assert_ne!(current, read_at);
    assert!(cache.set(&key, list(&["new"]), TTL, current).await.unwrap());
    assert_eq!(cache.get(&key).await.unwrap(), Some(list(&["new"])));
}

#[tokio::test]
async fn invalidating_one_resource_keeps_other_generations() {
    let cache = MemoryListCache::new(10);
    let menu_at = cache.generation("menu").await.unwrap();

    cache.invalidate("tag").await.unwrap();

    assert!(
        cache
            .set(&CacheKey::new("menu", "all"), list(&["m"]), TTL, menu_at)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn expired_entry_is_a_miss_and_is_dropped() {
    let cache = MemoryListCache::new(10);
    let key = CacheKey::new("tag", "short");

    store(&cache, &key, list(&["a"]), Duration::from_millis(20)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.get(&key).await.unwrap(), None);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn full_cache_skips_new_shapes_but_refreshes_existing() {
    let cache = MemoryListCache::new(1);
    let first = CacheKey::new("tag", "first");
    let second = CacheKey::new("tag", "second");

    assert!(store(&cache, &first, list(&["a"]), TTL).await);
    assert!(!store(&cache, &second, list(&["b"]), TTL).await);
    assert!(cache.get(&second).await.unwrap().is_none());

    assert!(store(&cache, &first, list(&["a", "b"]), TTL).await);
    assert_eq!(cache.get(&first).await.unwrap().map(|l| l.count), Some(2));
}

#[tokio::test]
async fn disabled_cache_never_hits() {
    let cache = NoopListCache;
    let key = CacheKey::new("tag", "any");

    assert!(!cache.set(&key, list(&["a"]), TTL, 0).await.unwrap());

    assert_eq!(cache.get(&key).await.unwrap(), None);
    assert_eq!(cache.backend_name(), "disabled");
}

#[tokio::test]
async fn unreachable_redis_falls_back_to_no_cache() {
    let mut settings = test_settings();
    settings.cache.backend = CacheBackend::Redis;
    settings.redis.url = "redis://127.0.0.1:1".to_string();
    settings.redis.connect_timeout_secs = 1;

    let started = Instant::now();
    let cache = build_cache(&settings).await;

    assert_eq!(cache.backend_name(), "disabled");
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// Memory cache that lets one write land in the store between the list
/// read and the cache write, the way a concurrent `add` would.
struct InterleavingCache {
    inner: MemoryListCache,
    db: OnceLock<Database>,
    fired: AtomicBool,
}

#[async_trait]
impl ListCache for InterleavingCache {
    fn backend_name(&self) -> &'static str {
        "interleaving"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedList>, CacheError> {
        self.inner.get(key).await
    }

    async fn generation(&self, resource: &str) -> Result<u64, CacheError> {
        self.inner.generation(resource).await
    }

    async fn set(
        &self,
        key: &CacheKey,
        list: CachedList,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(db) = self.db.get() {
                db.collection::<Document>("tags")
                    .insert_one(doc! { "name": "late", "createdAt": bson::DateTime::now() })
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
            self.inner.invalidate(&key.resource).await?;
        }
        self.inner.set(key, list, ttl, generation).await
    }

    async fn invalidate(&self, resource: &str) -> Result<(), CacheError> {
        self.inner.invalidate(resource).await
    }
}

#[tokio::test]
async fn mutation_during_a_list_read_is_seen_by_the_next_read() {
    let cache = Arc::new(InterleavingCache {
        inner: MemoryListCache::new(10),
        db: OnceLock::new(),
        fired: AtomicBool::new(false),
    });
    let app = TestApp::spawn_with_cache(cache.clone()).await;
    let _ = cache.db.set(app.db.clone());
    app.seed_record("tag", json!({ "name": "early" })).await;

    let tags = app.state.resource(ResourceKind::Tag).unwrap();
    let query = ListQuery::default();

    let first = tags.list(&query, None).await.unwrap();
    assert_eq!(first.count, 1);
    assert!(!first.from_cache);
    assert!(cache.inner.is_empty());

    let second = tags.list(&query, None).await.unwrap();
    assert_eq!(second.count, 2);
    assert!(!second.from_cache);

    let third = tags.list(&query, None).await.unwrap();
    assert_eq!(third.count, 2);
    assert!(third.from_cache);
}

/// Backend that is down for every call.
struct FailingCache;

#[async_trait]
impl ListCache for FailingCache {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedList>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn generation(&self, _resource: &str) -> Result<u64, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn set(
        &self,
        _key: &CacheKey,
        _list: CachedList,
        _ttl: Duration,
        _generation: u64,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn invalidate(&self, _resource: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

#[tokio::test]
async fn failing_cache_never_fails_lists_or_mutations() {
    let app = TestApp::spawn_with_cache(Arc::new(FailingCache)).await;

    let (status, json) = app.post_json("/api/resource/tag/get-all", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 0);

    let (status, json) = app
        .post_json("/api/resource/tag/add", json!({ "name": "still works" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(json["success"], true);

    let (status, json) = app.post_json("/api/resource/tag/get-all", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["name"], "still works");
}
