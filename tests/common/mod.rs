//! Shared test infrastructure: scripted backends, a replayable source, and
//! client construction helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use tierkv::codecs::{PlainCompressor, PlainKey, PlainSerializer, PlainValue};
use tierkv::loader::Record;
use tierkv::traits::set_batch_serial;
use tierkv::{CacheBackend, CacheError, CacheResult, KvClient, KvClientBuilder, Source, async_trait};

pub fn key(message: &str) -> PlainKey {
    PlainKey::new(message)
}

pub fn val(message: &str) -> PlainValue {
    PlainValue::new(message)
}

/// Build a client over the given tiers with the plain codec pair.
pub fn client_over(tiers: Vec<Arc<dyn CacheBackend>>) -> KvClient<PlainKey, PlainValue> {
    KvClientBuilder::new()
        .with_tiers(tiers)
        .with_compressor(Box::new(PlainCompressor))
        .with_serializer(Box::new(PlainSerializer))
        .build()
        .unwrap()
}

/// Unique scratch directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("tierkv-test-{tag}-{}", rand::random::<u32>()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// In-memory backend with scriptable failures for exercising the client's
/// error paths.
#[derive(Default)]
pub struct ScriptedBackend {
    pub store: DashMap<String, Vec<u8>>,
    /// Fail every `get` with a backend error.
    pub fail_get: bool,
    /// Fail every `set` with a backend error.
    pub fail_set: bool,
    /// Fail `close` with a backend error.
    pub fail_close: bool,
    /// Fixed `set_nx` reply; `None` behaves like a real store.
    pub set_nx_reply: Option<bool>,
    /// Number of `set` calls observed.
    pub set_calls: AtomicU64,
    /// Whether `close` has been called.
    pub closed: AtomicBool,
}

#[async_trait]
impl CacheBackend for ScriptedBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if self.fail_get {
            return Err(CacheError::backend(anyhow::anyhow!("scripted get failure")));
        }
        Ok(self.store.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, val: &[u8]) -> CacheResult<()> {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_set {
            return Err(CacheError::backend(anyhow::anyhow!("scripted set failure")));
        }
        self.store.insert(key.to_string(), val.to_vec());
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.store.remove(key);
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
        if let Some(reply) = self.set_nx_reply {
            return Ok(reply);
        }
        if self.store.contains_key(key) {
            return Ok(false);
        }
        self.store.insert(key.to_string(), val.to_vec());
        Ok(true)
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        if self.fail_close {
            return Err(CacheError::backend(anyhow::anyhow!("scripted close failure")));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

/// Source replaying a fixed record vector through one worker.
pub struct VecSource {
    records: Vec<Record<PlainKey, PlainValue>>,
}

impl VecSource {
    pub fn new(records: Vec<Record<PlainKey, PlainValue>>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Source<PlainKey, PlainValue> for VecSource {
    async fn produce(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        tx: mpsc::Sender<Record<PlainKey, PlainValue>>,
    ) -> CacheResult<()> {
        workers.spawn(async move {
            for record in &self.records {
                if tx.send(record.clone()).await.is_err() {
                    break;
                }
            }
        });

        Ok(())
    }
}
