use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{CacheError, CacheKey, CachedList, ListCache};

struct Entry {
    list: CachedList,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Everything cached for one resource.
#[derive(Default)]
struct Shelf {
    generation: u64,
    shapes: HashMap<String, Entry>,
}

/// Process-local cache: resource -> shape -> entry. Expired entries are
/// dropped when read, never swept.
pub struct MemoryListCache {
    shelves: DashMap<String, Shelf>,
    max_entries: usize,
}

impl MemoryListCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            shelves: DashMap::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.shelves.iter().map(|shelf| shelf.shapes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListCache for MemoryListCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedList>, CacheError> {
        let Some(mut shelf) = self.shelves.get_mut(&key.resource) else {
            return Ok(None);
        };
        let now = Instant::now();
        match shelf.shapes.get(&key.shape) {
            Some(entry) if entry.is_expired(now) => {
                shelf.shapes.remove(&key.shape);
                debug!(resource = %key.resource, "Cached list expired");
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.list.clone())),
            None => Ok(None),
        }
    }

    async fn generation(&self, resource: &str) -> Result<u64, CacheError> {
        Ok(self.shelves.get(resource).map_or(0, |shelf| shelf.generation))
    }

    async fn set(
        &self,
        key: &CacheKey,
        list: CachedList,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError> {
        // Sized before the shelf is locked; `len` walks every shard.
        let is_new = self
            .shelves
            .get(&key.resource)
            .is_none_or(|shelf| !shelf.shapes.contains_key(&key.shape));
        if is_new && self.len() >= self.max_entries {
            debug!(resource = %key.resource, max = self.max_entries, "List cache full, not storing");
            return Ok(false);
        }

        // The generation check and the insert happen under the same shard lock
        // as `invalidate`, so a stale snapshot can never land after it.
        let mut shelf = self.shelves.entry(key.resource.clone()).or_default();
        if shelf.generation != generation {
            debug!(
                resource = %key.resource,
                read_at = generation,
                current = shelf.generation,
                "Stale list snapshot, not storing"
            );
            return Ok(false);
        }
        shelf.shapes.insert(
            key.shape.clone(),
            Entry {
                list,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn invalidate(&self, resource: &str) -> Result<(), CacheError> {
        let mut shelf = self.shelves.entry(resource.to_string()).or_default();
        shelf.generation = shelf.generation.wrapping_add(1);
        shelf.shapes.clear();
        Ok(())
    }
}
