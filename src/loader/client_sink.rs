//! Sink writing records into a tiered client in batches.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::warn;

use crate::client::KvClient;
use crate::error::CacheResult;
use crate::loader::{SharedReceiver, Sink};

fn default_thread_num() -> usize {
    10
}

fn default_batch() -> usize {
    100
}

/// Configuration for [`ClientSink`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ClientSinkConfig {
    /// Worker pool size.
    pub thread_num: usize,
    /// Records accumulated per worker before a batch write.
    pub batch: usize,
}

impl Default for ClientSinkConfig {
    fn default() -> Self {
        Self {
            thread_num: default_thread_num(),
            batch: default_batch(),
        }
    }
}

/// Sink draining records into a [`KvClient`] via `set_batch`.
///
/// Each worker accumulates up to `batch` records, flushes on the threshold,
/// and flushes its residual partial batch when the channel closes. Write
/// failures are counted and logged; they do not stop the pipeline.
pub struct ClientSink<K, V> {
    thread_num: usize,
    batch: usize,
    client: Arc<KvClient<K, V>>,
}

impl<K, V> ClientSink<K, V> {
    /// Create a client sink.
    pub fn new(config: ClientSinkConfig, client: Arc<KvClient<K, V>>) -> Self {
        Self {
            thread_num: config.thread_num,
            batch: config.batch.max(1),
            client,
        }
    }
}

#[async_trait]
impl<K, V> Sink<K, V> for ClientSink<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn consume(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        rx: SharedReceiver<K, V>,
    ) -> CacheResult<()> {
        for _ in 0..self.thread_num {
            let sink = Arc::clone(&self);
            let rx = Arc::clone(&rx);
            workers.spawn(async move {
                let mut keys = Vec::with_capacity(sink.batch);
                let mut vals = Vec::with_capacity(sink.batch);
                loop {
                    let record = { rx.lock().await.recv().await };
                    let Some(record) = record else {
                        break;
                    };
                    keys.push(record.key);
                    vals.push(record.val);
                    if keys.len() == sink.batch {
                        sink.flush(&mut keys, &mut vals).await;
                    }
                }
                sink.flush(&mut keys, &mut vals).await;
            });
        }

        Ok(())
    }
}

impl<K, V> ClientSink<K, V> {
    /// Write and clear the accumulated batch. Safe on an empty batch.
    async fn flush(&self, keys: &mut Vec<K>, vals: &mut Vec<V>) {
        match self.client.set_batch(keys, vals).await {
            Ok(results) => {
                let failed = results.iter().filter(|entry| entry.is_err()).count();
                if failed > 0 {
                    warn!(failed, total = keys.len(), "batch entries failed");
                }
            }
            Err(err) => {
                warn!(total = keys.len(), error = %err, "batch write failed");
            }
        }
        keys.clear();
        vals.clear();
    }
}
