//! Moka cache - in-process backend with per-entry TTL.
//!
//! The default front tier: bounded capacity with automatic eviction, plus
//! per-entry expiration layered on top, so the full optional-operation set
//! (`set_ex`, `set_nx`, `set_ex_nx`) is available.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use tracing::debug;

use crate::error::CacheResult;
use crate::traits::{CacheBackend, set_batch_serial};

/// Cache entry with expiration tracking.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, expiration: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: expiration.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }
}

fn default_max_capacity() -> u64 {
    100_000
}

/// Configuration for [`MokaCache`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MokaCacheConfig {
    /// Maximum number of entries before eviction.
    pub max_capacity: u64,
    /// Default expiration applied by `set`/`set_nx`. `None` keeps entries
    /// until evicted.
    #[serde(with = "humantime_serde")]
    pub expiration: Option<Duration>,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            expiration: None,
        }
    }
}

/// Moka in-process cache with per-entry TTL.
pub struct MokaCache {
    cache: Cache<String, CacheEntry>,
    expiration: Option<Duration>,
}

impl MokaCache {
    /// Create a new Moka cache.
    #[must_use]
    pub fn new(config: MokaCacheConfig) -> Self {
        debug!(
            capacity = config.max_capacity,
            expiration = ?config.expiration,
            "initializing Moka cache"
        );

        Self {
            cache: Cache::builder().max_capacity(config.max_capacity).build(),
            expiration: config.expiration,
        }
    }

    /// Drop an expired entry so conditional writes see liveness, not residue.
    async fn purge_expired(&self, key: &str) {
        if let Some(entry) = self.cache.get(key).await {
            if entry.is_expired() {
                self.cache.remove(key).await;
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MokaCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.cache.remove(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, val: &[u8]) -> CacheResult<()> {
        let entry = CacheEntry::new(val.to_vec(), self.expiration);
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn set_batch(
        &self,
        keys: &[String],
        vals: &[Vec<u8>],
    ) -> CacheResult<Vec<CacheResult<()>>> {
        set_batch_serial(self, keys, vals).await
    }

    async fn set_ex(&self, key: &str, val: &[u8], ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry::new(val.to_vec(), Some(ttl));
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn set_nx(&self, key: &str, val: &[u8]) -> CacheResult<bool> {
        self.purge_expired(key).await;
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(async { CacheEntry::new(val.to_vec(), self.expiration) })
            .await;
        Ok(entry.is_fresh())
    }

    async fn set_ex_nx(&self, key: &str, val: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.purge_expired(key).await;
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(async { CacheEntry::new(val.to_vec(), Some(ttl)) })
            .await;
        Ok(entry.is_fresh())
    }

    fn name(&self) -> &'static str {
        "Moka"
    }
}
