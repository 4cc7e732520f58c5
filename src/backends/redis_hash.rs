//! Redis hash cache - field store with fingerprint splitting.
//!
//! Many fingerprints share one Redis hash: a slice of the fingerprint picks
//! the bucketing key, the remainder becomes the field. This keeps the key
//! space small on stores whose per-key overhead dominates, at the cost of
//! per-entry expiration (hash fields cannot expire individually, so `set_ex`
//! and `set_ex_nx` report `Unsupported`).

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::traits::{CacheBackend, check_batch_shape};

/// Partition a fingerprint into `(bucket, field)`.
///
/// The bucket is the `key_len` bytes starting at `key_idx`; the field is
/// everything else, front part first. Short fingerprints degrade gracefully:
/// with fewer than `key_idx + key_len` bytes the tail past `key_idx` becomes
/// the bucket, and with at most `key_idx` bytes the bucket is empty and the
/// whole fingerprint is the field. For a fixed `(key_idx, key_len)` the
/// mapping is invertible for fingerprints longer than `key_idx`.
#[must_use]
pub fn split_fingerprint(fp: &[u8], key_idx: usize, key_len: usize) -> (Vec<u8>, Vec<u8>) {
    if fp.len() > key_idx + key_len {
        let bucket = fp[key_idx..key_idx + key_len].to_vec();
        let mut field = Vec::with_capacity(fp.len() - key_len);
        field.extend_from_slice(&fp[..key_idx]);
        field.extend_from_slice(&fp[key_idx + key_len..]);
        (bucket, field)
    } else if fp.len() > key_idx {
        (fp[key_idx..].to_vec(), fp[..key_idx].to_vec())
    } else {
        (Vec::new(), fp.to_vec())
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_millis(1000)
}

fn default_retries() -> usize {
    3
}

fn default_key_idx() -> usize {
    8
}

fn default_key_len() -> usize {
    7
}

/// Configuration for [`RedisHashCache`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisHashCacheConfig {
    /// Connection string, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Connection and response timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Reconnect retries before a command fails.
    pub retries: usize,
    /// Offset of the bucket slice inside the fingerprint.
    pub key_idx: usize,
    /// Length of the bucket slice.
    pub key_len: usize,
}

impl Default for RedisHashCacheConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: default_timeout(),
            retries: default_retries(),
            key_idx: default_key_idx(),
            key_len: default_key_len(),
        }
    }
}

/// Redis-backed tier packing fingerprints into hash fields.
pub struct RedisHashCache {
    conn_manager: ConnectionManager,
    key_idx: usize,
    key_len: usize,
}

impl RedisHashCache {
    /// Connect and verify the server with a `PING`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Config`] for an invalid URL, [`CacheError::Backend`]
    /// when the connection cannot be established.
    pub async fn new(config: RedisHashCacheConfig) -> CacheResult<Self> {
        info!(
            url = %config.url,
            key_idx = config.key_idx,
            key_len = config.key_len,
            "initializing Redis hash cache"
        );

        let client = Client::open(config.url.as_str())
            .map_err(|err| CacheError::Config(format!("redis url [{}]: {err}", config.url)))?;
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Some(config.timeout))
            .set_response_timeout(Some(config.timeout))
            .set_number_of_retries(config.retries);
        let conn_manager = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(CacheError::backend)?;

        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;

        Ok(Self {
            conn_manager,
            key_idx: config.key_idx,
            key_len: config.key_len,
        })
    }

    fn parse_key(&self, key: &str) -> (Vec<u8>, Vec<u8>) {
        split_fingerprint(key.as_bytes(), self.key_idx, self.key_len)
    }
}

#[async_trait]
impl CacheBackend for RedisHashCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let (bucket, field) = self.parse_key(key);
        let mut conn = self.conn_manager.clone();
        conn.hget::<_, _, Option<Vec<u8>>>(bucket, field)
            .await
            .map_err(CacheError::backend)
    }

    async fn set(&self, key: &str, val: &[u8]) -> CacheResult<()> {
        let (bucket, field) = self.parse_key(key);
        let mut conn = self.conn_manager.clone();
        conn.hset::<_, _, _, ()>(bucket, field, val)
            .await
            .map_err(CacheError::backend)
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let (bucket, field) = self.parse_key(key);
        let mut conn = self.conn_manager.clone();
        conn.hdel::<_, _, ()>(bucket, field)
            .await
            .map_err(CacheError::backend)
    }

    async fn set_batch(
        &self,
        keys: &[String],
        vals: &[Vec<u8>],
    ) -> CacheResult<Vec<CacheResult<()>>> {
        check_batch_shape(keys, vals)?;

        let mut pipe = redis::pipe();
        for (key, val) in keys.iter().zip(vals) {
            let (bucket, field) = self.parse_key(key);
            pipe.cmd("HSET")
                .arg(bucket)
                .arg(field)
                .arg(val.as_slice())
                .ignore();
        }

        let mut conn = self.conn_manager.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        debug!(count = keys.len(), "[RedisHash] pipelined batch write");

        Ok(keys.iter().map(|_| Ok(())).collect())
    }

    async fn set_nx(&self, key: &str, val: &[u8]) -> CacheResult<bool> {
        let (bucket, field) = self.parse_key(key);
        let mut conn = self.conn_manager.clone();
        conn.hset_nx::<_, _, _, bool>(bucket, field, val)
            .await
            .map_err(CacheError::backend)
    }

    fn name(&self) -> &'static str {
        "RedisHash"
    }
}

#[cfg(test)]
mod tests {
    use super::split_fingerprint;

    #[test]
    fn long_fingerprint_splits_bucket_out_of_the_middle() {
        let (bucket, field) = split_fingerprint(b"01234567890123456789", 8, 7);
        assert_eq!(bucket, b"8901234");
        assert_eq!(field, b"0123456756789");
    }

    #[test]
    fn short_fingerprint_uses_the_tail_as_bucket() {
        let (bucket, field) = split_fingerprint(b"012345678901234", 8, 7);
        assert_eq!(bucket, b"8901234");
        assert_eq!(field, b"01234567");
    }

    #[test]
    fn tiny_fingerprint_has_empty_bucket() {
        let (bucket, field) = split_fingerprint(b"01234567", 8, 7);
        assert_eq!(bucket, b"");
        assert_eq!(field, b"01234567");
    }

    #[test]
    fn split_is_invertible_past_key_idx() {
        // bucket/field lengths identify which branch produced them, so the
        // original fingerprint can be reassembled.
        let (key_idx, key_len) = (8, 7);
        for fp in [
            b"0123456789".as_slice(),
            b"012345678901234",
            b"0123456789012345",
            b"01234567890123456789",
        ] {
            let (bucket, field) = split_fingerprint(fp, key_idx, key_len);
            let rebuilt = if bucket.len() == key_len && field.len() >= key_idx {
                let mut fp = field[..key_idx].to_vec();
                fp.extend_from_slice(&bucket);
                fp.extend_from_slice(&field[key_idx..]);
                fp
            } else {
                let mut fp = field.clone();
                fp.extend_from_slice(&bucket);
                fp
            };
            assert_eq!(rebuilt, fp, "fingerprint {:?}", String::from_utf8_lossy(fp));
        }
    }
}
