use std::time::Duration;

use async_trait::async_trait;
use backoffice_config::RedisSettings;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::{debug, info};

use super::{CacheError, CacheKey, CachedList, ListCache};

/// KEYS: generation, entry, index. ARGV: expected generation, payload, ttl.
const STORE_IF_CURRENT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current ~= tonumber(ARGV[1]) then
    return 0
end
redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[3])
redis.call('SADD', KEYS[3], KEYS[2])
redis.call('EXPIRE', KEYS[3], ARGV[3])
return 1
";

/// KEYS: generation, index.
const DROP_AND_BUMP: &str = r"
for _, key in ipairs(redis.call('SMEMBERS', KEYS[2])) do
    redis.call('DEL', key)
end
redis.call('DEL', KEYS[2])
return redis.call('INCR', KEYS[1])
";

/// Shared cache for multi-process deployments. Entries are BSON-encoded and
/// written with `SET EX`; each resource keeps a set of its entry keys so
/// invalidation can drop every shape at once, plus a generation counter that
/// the store script checks. Both scripts run atomically on the server, which
/// the multiplexed connection could not guarantee with `WATCH`.
pub struct RedisListCache {
    conn: ConnectionManager,
    prefix: String,
    store: Script,
    drop_and_bump: Script,
}

impl RedisListCache {
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = Client::open(settings.url.as_str())?;
        let timeout = Duration::from_secs(settings.connect_timeout_secs);
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::Backend(format!(
                    "no connection to {} within {}s",
                    settings.url, settings.connect_timeout_secs
                ))
            })??;
        info!(url = %settings.url, "Connected to Redis list cache");
        Ok(Self {
            conn,
            prefix: settings.key_prefix.clone(),
            store: Script::new(STORE_IF_CURRENT),
            drop_and_bump: Script::new(DROP_AND_BUMP),
        })
    }

    fn entry_key(&self, key: &CacheKey) -> String {
        format!("{}:list:{}:{}", self.prefix, key.resource, key.shape)
    }

    fn index_key(&self, resource: &str) -> String {
        format!("{}:list-index:{}", self.prefix, resource)
    }

    fn generation_key(&self, resource: &str) -> String {
        format!("{}:list-gen:{}", self.prefix, resource)
    }
}

#[async_trait]
impl ListCache for RedisListCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedList>, CacheError> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.get(self.entry_key(key)).await?;
        Ok(bytes
            .map(|bytes| bson::from_slice::<CachedList>(&bytes))
            .transpose()?)
    }

    async fn generation(&self, resource: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let generation: Option<u64> = conn.get(self.generation_key(resource)).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn set(
        &self,
        key: &CacheKey,
        list: CachedList,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError> {
        let bytes = bson::to_vec(&list)?;
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.conn.clone();
        let stored: i64 = self
            .store
            .key(self.generation_key(&key.resource))
            .key(self.entry_key(key))
            .key(self.index_key(&key.resource))
            .arg(generation)
            .arg(bytes)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        if stored == 0 {
            debug!(resource = %key.resource, read_at = generation, "Stale list snapshot, not storing");
        }
        Ok(stored == 1)
    }

    async fn invalidate(&self, resource: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let generation: u64 = self
            .drop_and_bump
            .key(self.generation_key(resource))
            .key(self.index_key(resource))
            .invoke_async(&mut conn)
            .await?;
        debug!(resource, generation, "Redis list cache generation bumped");
        Ok(())
    }
}
