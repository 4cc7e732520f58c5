//! Remote-object record source.
//!
//! The concrete object-storage driver lives behind the [`ObjectStore`] seam;
//! this module specifies its behavior as a line source: the listing must
//! contain a `_SUCCESS` completion marker, object names are sharded with a
//! deterministic partition filter, and each object is fetched under a
//! deadline with transient failures skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, warn};

use crate::error::{CacheError, CacheResult};
use crate::loader::{Coder, Record, Source};

/// Completion marker expected in every finished listing.
const SUCCESS_MARKER: &str = "_SUCCESS";

/// Per-object fetch deadline.
const FETCH_DEADLINE: Duration = Duration::from_secs(30);

/// Listing and fetching for an object namespace.
///
/// Implementations wrap a concrete store (an S3-compatible service, a
/// filesystem, a test fixture). Object names returned by `list` are passed
/// back to `fetch` verbatim.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the object names under `prefix`.
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Fetch one object's content.
    async fn fetch(&self, name: &str) -> anyhow::Result<Vec<u8>>;
}

/// Filesystem-backed [`ObjectStore`]: object names are paths relative to a
/// root directory. Handy for staging directories laid out like a remote
/// bucket, and for tests.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let dir = self.root.join(prefix);
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(format!("{prefix}/{}", entry.file_name().to_string_lossy()));
            }
        }
        Ok(names)
    }

    async fn fetch(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        Ok(tokio::fs::read(self.root.join(name)).await?)
    }
}

fn default_thread_num() -> usize {
    10
}

fn default_shards() -> u64 {
    1
}

/// Configuration for [`ObjectSource`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectSourceConfig {
    /// Listing prefix, e.g. `user/exports/kv`.
    pub prefix: String,
    /// Suffix appended to the prefix, usually a datetime partition.
    pub suffix: String,
    /// Worker pool size.
    pub thread_num: usize,
    /// Number of shards the object set is partitioned into.
    #[serde(rename = "mod")]
    pub shards: u64,
    /// This loader's shard index in `0..shards`.
    #[serde(rename = "idx")]
    pub shard_idx: u64,
}

impl Default for ObjectSourceConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            thread_num: default_thread_num(),
            shards: default_shards(),
            shard_idx: 0,
        }
    }
}

/// Source reading `coder`-encoded lines from the objects under
/// `prefix/suffix`.
pub struct ObjectSource<K, V> {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    suffix: String,
    thread_num: usize,
    shards: u64,
    shard_idx: u64,
    coder: Arc<dyn Coder<K, V>>,
}

impl<K, V> ObjectSource<K, V> {
    /// Create an object source over a store.
    pub fn new(
        config: ObjectSourceConfig,
        store: Arc<dyn ObjectStore>,
        coder: Arc<dyn Coder<K, V>>,
    ) -> Self {
        Self {
            store,
            prefix: config.prefix,
            suffix: config.suffix,
            thread_num: config.thread_num,
            shards: config.shards.max(1),
            shard_idx: config.shard_idx,
            coder,
        }
    }

    /// List this shard's objects.
    ///
    /// # Errors
    ///
    /// A listing failure, or a listing without the `_SUCCESS` marker: an
    /// incomplete export must not be half-loaded.
    async fn list(&self) -> CacheResult<Vec<String>> {
        let listing_prefix = format!("{}/{}", self.prefix, self.suffix);
        let names = self
            .store
            .list(&listing_prefix)
            .await
            .map_err(CacheError::backend)?;

        let mut success = false;
        let mut parts = Vec::new();
        for name in names {
            if Path::new(&name).file_name().is_some_and(|base| base == SUCCESS_MARKER) {
                success = true;
                continue;
            }
            if fnv1a64(name.as_bytes()) % self.shards != self.shard_idx {
                continue;
            }
            parts.push(name);
        }

        if !success {
            return Err(CacheError::Backend(anyhow!(
                "listing under [{listing_prefix}] has no {SUCCESS_MARKER} marker"
            )));
        }

        Ok(parts)
    }
}

/// FNV-1a 64. The shard filter needs a hash that is stable across processes
/// and runs; std's default hasher is keyed and is not.
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[async_trait]
impl<K, V> Source<K, V> for ObjectSource<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    async fn produce(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        tx: mpsc::Sender<Record<K, V>>,
    ) -> CacheResult<()> {
        let objects = self.list().await?;

        let (obj_tx, obj_rx) = mpsc::channel(objects.len().max(1));
        tokio::spawn(async move {
            for object in objects {
                if obj_tx.send(object).await.is_err() {
                    break;
                }
            }
        });

        let obj_rx = Arc::new(Mutex::new(obj_rx));
        for _ in 0..self.thread_num {
            let source = Arc::clone(&self);
            let obj_rx = Arc::clone(&obj_rx);
            let tx = tx.clone();
            workers.spawn(async move {
                loop {
                    let object = { obj_rx.lock().await.recv().await };
                    let Some(name) = object else {
                        break;
                    };
                    source.read_object(&name, &tx).await;
                }
            });
        }

        Ok(())
    }
}

impl<K, V> ObjectSource<K, V> {
    async fn read_object(&self, name: &str, tx: &mpsc::Sender<Record<K, V>>) {
        let body = match timeout(FETCH_DEADLINE, self.store.fetch(name)).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                error!(object = name, error = %err, "object fetch failed, skipping");
                return;
            }
            Err(_) => {
                error!(object = name, deadline = ?FETCH_DEADLINE, "object fetch timed out, skipping");
                return;
            }
        };

        let text = String::from_utf8_lossy(&body);
        for line in text.lines() {
            match self.coder.decode(line) {
                Ok(record) => {
                    if tx.send(record).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(object = name, error = %err, "skipping undecodable line");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fnv1a64;

    #[test]
    fn shard_hash_is_stable() {
        // Pinned values: the partition assignment must never drift between
        // builds, or re-runs of a sharded load would overlap or leave gaps.
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
