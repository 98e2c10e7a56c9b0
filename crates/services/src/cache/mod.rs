//! Whole-collection cache for unfiltered, unpaginated list queries.
//!
//! Only the "list everything" shape is ever stored; entries are keyed by
//! resource plus the pipeline shape (sort + projection) and dropped wholesale
//! for a resource on any mutation against it.
//!
//! Each resource also carries a generation that every invalidation bumps. A
//! reader takes the generation before querying the store and hands it back to
//! [`ListCache::set`], which refuses to store a snapshot taken before a later
//! invalidation.

pub mod memory;
pub mod redis_backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoffice_config::{CacheBackend, Settings};
use bson::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use memory::MemoryListCache;
pub use redis_backend::RedisListCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
    #[error("cache entry codec error: {0}")]
    Codec(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<bson::ser::Error> for CacheError {
    fn from(err: bson::ser::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

impl From<bson::de::Error> for CacheError {
    fn from(err: bson::de::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: String,
    pub shape: String,
}

impl CacheKey {
    pub fn new(resource: impl Into<String>, shape: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            shape: shape.into(),
        }
    }
}

/// The full result set of one unfiltered list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedList {
    pub records: Vec<Document>,
    pub count: u64,
}

#[async_trait]
pub trait ListCache: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedList>, CacheError>;

    /// Current invalidation generation of `resource`.
    async fn generation(&self, resource: &str) -> Result<u64, CacheError>;

    /// Stores `list` only while `key.resource` is still at `generation`.
    /// Returns whether the entry was written.
    async fn set(
        &self,
        key: &CacheKey,
        list: CachedList,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError>;

    /// Drops every cached shape of `resource` and bumps its generation.
    async fn invalidate(&self, resource: &str) -> Result<(), CacheError>;
}

/// Used when caching is switched off: every read is a miss.
pub struct NoopListCache;

#[async_trait]
impl ListCache for NoopListCache {
    fn backend_name(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedList>, CacheError> {
        Ok(None)
    }

    async fn generation(&self, _resource: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn set(
        &self,
        _key: &CacheKey,
        _list: CachedList,
        _ttl: Duration,
        _generation: u64,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn invalidate(&self, _resource: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Builds the configured backend. A backend that cannot be reached at start
/// up degrades to [`NoopListCache`]: lists are then always read from the
/// store, never refused.
pub async fn build_cache(settings: &Settings) -> Arc<dyn ListCache> {
    let cache: Arc<dyn ListCache> = match settings.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryListCache::new(settings.cache.max_entries)),
        CacheBackend::Redis => match RedisListCache::connect(&settings.redis).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                warn!(error = %e, url = %settings.redis.url, "Redis list cache unavailable, caching disabled");
                Arc::new(NoopListCache)
            }
        },
        CacheBackend::Disabled => Arc::new(NoopListCache),
    };
    info!(
        backend = cache.backend_name(),
        ttl_secs = settings.cache.ttl_secs,
        "List cache ready"
    );
    cache
}
