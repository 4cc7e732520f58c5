//! Redis string cache - remote backend over string-typed keys.
//!
//! Each fingerprint maps to one Redis string. Batch writes are pipelined on
//! the wire; conditional writes use `SET .. NX [EX ..]` so the check and the
//! write are one round trip.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::traits::{CacheBackend, check_batch_shape};

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_millis(1000)
}

fn default_retries() -> usize {
    3
}

/// Configuration for [`RedisStringCache`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisStringCacheConfig {
    /// Connection string, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Connection and response timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Reconnect retries before a command fails.
    pub retries: usize,
    /// Default expiration applied by `set`/`set_nx`/`set_batch`. `None`
    /// stores without expiry.
    #[serde(with = "humantime_serde")]
    pub expiration: Option<Duration>,
}

impl Default for RedisStringCacheConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: default_timeout(),
            retries: default_retries(),
            expiration: None,
        }
    }
}

/// Redis-backed tier storing one string per fingerprint.
pub struct RedisStringCache {
    conn_manager: ConnectionManager,
    expiration: Option<Duration>,
}

impl RedisStringCache {
    /// Connect and verify the server with a `PING`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Config`] for an invalid URL, [`CacheError::Backend`]
    /// when the connection cannot be established.
    pub async fn new(config: RedisStringCacheConfig) -> CacheResult<Self> {
        info!(url = %config.url, "initializing Redis string cache");

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
            expiration: config.expiration,
        })
    }
}

/// Seconds for a Redis `EX` argument; Redis rejects a zero expire.
fn expire_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for RedisStringCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(CacheError::backend)
    }

    async fn set(&self, key: &str, val: &[u8]) -> CacheResult<()> {
        let mut conn = self.conn_manager.clone();
        match self.expiration {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, val, expire_secs(ttl))
                .await
                .map_err(CacheError::backend),
            None => conn
                .set::<_, _, ()>(key, val)
                .await
                .map_err(CacheError::backend),
        }
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn_manager.clone();
        conn.del::<_, ()>(key).await.map_err(CacheError::backend)
    }

    async fn set_batch(
        &self,
        keys: &[String],
        vals: &[Vec<u8>],
    ) -> CacheResult<Vec<CacheResult<()>>> {
        check_batch_shape(keys, vals)?;

        let mut pipe = redis::pipe();
        for (key, val) in keys.iter().zip(vals) {
            match self.expiration {
                Some(ttl) => {
                    pipe.cmd("SETEX")
                        .arg(key)
                        .arg(expire_secs(ttl))
                        .arg(val.as_slice())
                        .ignore();
                }
                None => {
                    pipe.cmd("SET").arg(key).arg(val.as_slice()).ignore();
                }
            }
        }

        let mut conn = self.conn_manager.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        debug!(count = keys.len(), "[RedisString] pipelined batch write");

        Ok(keys.iter().map(|_| Ok(())).collect())
    }

    async fn set_ex(&self, key: &str, val: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn_manager.clone();
        conn.set_ex::<_, _, ()>(key, val, expire_secs(ttl))
            .await
            .map_err(CacheError::backend)
    }

    async fn set_nx(&self, key: &str, val: &[u8]) -> CacheResult<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(val).arg("NX");
        if let Some(ttl) = self.expiration {
            cmd.arg("EX").arg(expire_secs(ttl));
        }

        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(CacheError::backend)?;
        Ok(reply.is_some())
    }

    async fn set_ex_nx(&self, key: &str, val: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(val)
            .arg("NX")
            .arg("EX")
            .arg(expire_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(reply.is_some())
    }

    fn name(&self) -> &'static str {
        "RedisString"
    }
}
