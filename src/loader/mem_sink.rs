//! Sink collecting records in memory.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinSet;

use crate::error::CacheResult;
use crate::loader::{Record, SharedReceiver, Sink};

/// Sink appending every record to a shared vector.
///
/// Single worker; the collected records back the benchmark's working set.
pub struct MemSink<K, V> {
    records: Mutex<Vec<Record<K, V>>>,
}

impl<K, V> MemSink<K, V> {
    /// Create an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Number of records collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Take the collected records, leaving the sink empty.
    #[must_use]
    pub fn take_records(&self) -> Vec<Record<K, V>> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl<K, V> Default for MemSink<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Sink<K, V> for MemSink<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn consume(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        rx: SharedReceiver<K, V>,
    ) -> CacheResult<()> {
        workers.spawn(async move {
            loop {
                let record = { rx.lock().await.recv().await };
                let Some(record) = record else {
                    break;
                };
                self.records.lock().push(record);
            }
        });

        Ok(())
    }
}
