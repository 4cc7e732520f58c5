//! `DashMap` cache - simple concurrent in-process backend.
//!
//! Entries share the construction-time default expiration; there is no
//! per-entry TTL, so `set_ex`/`set_ex_nx` report `Unsupported`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
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

/// Configuration for [`DashMapCache`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct DashMapCacheConfig {
    /// Default expiration applied to every entry. `None` keeps entries until
    /// deleted.
    #[serde(with = "humantime_serde")]
    pub expiration: Option<Duration>,
}

/// Concurrent map cache.
///
/// A front-tier heat buffer with lock-free reads and writes. Expired entries
/// are dropped lazily on access; there is no background eviction and no size
/// bound.
pub struct DashMapCache {
    map: DashMap<String, CacheEntry>,
    expiration: Option<Duration>,
}

impl DashMapCache {
    /// Create a new `DashMap` cache.
    #[must_use]
    pub fn new(config: DashMapCacheConfig) -> Self {
        debug!(expiration = ?config.expiration, "initializing DashMap cache");
        Self {
            map: DashMap::new(),
            expiration: config.expiration,
        }
    }

    /// Number of live entries (expired residue included until touched).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop an expired entry so conditional writes see liveness, not residue.
    fn purge_expired(&self, key: &str) {
        if let Some(entry) = self.map.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.map.remove(key);
            }
        }
    }
}

impl Default for DashMapCache {
    fn default() -> Self {
        Self::new(DashMapCacheConfig::default())
    }
}

#[async_trait]
impl CacheBackend for DashMapCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.map.get(key) {
            Some(entry) if entry.is_expired() => {
                drop(entry);
                self.map.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, val: &[u8]) -> CacheResult<()> {
        self.map.insert(
            key.to_string(),
            CacheEntry::new(val.to_vec(), self.expiration),
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.map.remove(key);
        Ok(())
    }

    async fn set_batch(
        &self,
        keys: &[String],
        vals: &[Vec<u8>],
    ) -> CacheResult<Vec<CacheResult<()>>> {
        set_batch_serial(self, keys, vals).await
    }

    async fn set_nx(&self, key: &str, val: &[u8]) -> CacheResult<bool> {
        self.purge_expired(key);
        match self.map.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry::new(val.to_vec(), self.expiration));
                Ok(true)
            }
        }
    }

    fn name(&self) -> &'static str {
        "DashMap"
    }
}
