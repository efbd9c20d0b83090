//! Key/value cache used for token verification results, the token block
//! list, request throttling counters and short-lived query results.
//!
//! Two backends share the [`CacheStore`] trait: [`RedisCache`] when a Redis
//! URL is configured, otherwise the process-local [`MemoryCache`].

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info};

use crate::infra::errors::AppError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        tracing::error!(error = %err, "cache operation failed");
        AppError::internal("Cache operation failed")
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` for `ttl`. A zero TTL is treated as one millisecond.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Increment an integer counter, (re)setting its lifetime to `ttl`.
    async fn incr(&self, key: &str, ttl: Duration) -> CacheResult<i64>;
}

/// Typed helpers layered over any [`CacheStore`].
#[async_trait]
pub trait CacheExt: CacheStore {
    async fn get_json<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => {
                debug!("Cache HIT: {}", key);
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl).await
    }
}

impl<S: CacheStore + ?Sized> CacheExt for S {}

fn at_least_one_ms(ttl: Duration) -> Duration {
    ttl.max(Duration::from_millis(1))
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache with per-entry expiry.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let expires_at = Instant::now() + at_least_one_ms(ttl);
        self.entries
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        let now = Instant::now();
        let expires_at = now + at_least_one_ms(ttl);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry {
                value: "0".to_string(),
                expires_at,
            });
        let current = if entry.expires_at > now {
            entry.value.parse::<i64>().unwrap_or(0)
        } else {
            0
        };
        let next = current + 1;
        entry.value = next.to_string();
        entry.expires_at = expires_at;
        Ok(next)
    }
}

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> CacheResult<Self> {
        info!("Connecting to Redis cache");
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Successfully connected to Redis cache");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let millis = at_least_one_ms(ttl).as_millis() as u64;
        conn.pset_ex::<_, _, ()>(key, value, millis).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let millis = at_least_one_ms(ttl).as_millis() as i64;
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .pexpire(key, millis)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

/// Cache key helpers.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    pub const MOVIE_RECENT: &'static str = "MOVIE_RECENT";

    pub fn verified_token(token: &str) -> String {
        format!("TOKEN_{token}")
    }

    pub fn blocked_token(token: &str) -> String {
        format!("BLOCK_TOKEN_{token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        n: i32,
    }

    #[tokio::test]
    async fn stores_and_reads_json() {
        let cache = MemoryCache::new();
        cache
            .set_json("k", &Payload { n: 7 }, Duration::from_secs(5))
            .await
            .unwrap();
        let value: Option<Payload> = cache.get_json("k").await.unwrap();
        assert_eq!(value, Some(Payload { n: 7 }));

        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set("short", "v".into(), Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set("long", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn counters_increment_and_reset_after_expiry() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("c", Duration::from_millis(20)).await.unwrap(), 1);
        assert_eq!(cache.incr("c", Duration::from_millis(20)).await.unwrap(), 2);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.incr("c", Duration::from_secs(1)).await.unwrap(), 1);
    }

    #[test]
    fn key_helpers() {
        assert_eq!(CacheKeys::blocked_token("abc"), "BLOCK_TOKEN_abc");
        assert_eq!(CacheKeys::verified_token("abc"), "TOKEN_abc");
    }
}
