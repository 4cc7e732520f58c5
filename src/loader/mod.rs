//! Bulk-load pipeline.
//!
//! A [`Loader`] wires one [`Source`] (producer worker pool) to one [`Sink`]
//! (consumer worker pool) through a bounded channel of [`Record`]s and
//! enforces an ordered shutdown: the channel closes only after every
//! producer worker has finished, and `load` returns only after every
//! consumer worker has drained.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tierkv::loader::{FakeSource, FakeSourceConfig, Loader, MemSink};
//!
//! # async fn example() -> tierkv::CacheResult<()> {
//! let source = Arc::new(FakeSource::new(FakeSourceConfig {
//!     total: 1000,
//!     ..FakeSourceConfig::default()
//! }));
//! let sink = Arc::new(MemSink::new());
//! Loader::new(source, sink.clone()).load().await?;
//! assert_eq!(sink.len(), 1000);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::error::CacheResult;

mod client_sink;
mod coder;
mod fake_source;
mod file_sink;
mod file_source;
mod mem_sink;
mod object_source;

pub use client_sink::{ClientSink, ClientSinkConfig};
pub use coder::TsvCoder;
pub use fake_source::{FakeSource, FakeSourceConfig};
pub use file_sink::{FileSink, FileSinkConfig};
pub use file_source::{FileSource, FileSourceConfig};
pub use mem_sink::MemSink;
pub use object_source::{FsObjectStore, ObjectSource, ObjectSourceConfig, ObjectStore};

/// Capacity of the record channel between source and sink.
pub const CHANNEL_CAPACITY: usize = 10_000;

/// One key/value pair carried through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<K, V> {
    /// User key.
    pub key: K,
    /// User value.
    pub val: V,
}

impl<K, V> Record<K, V> {
    /// Create a record.
    pub fn new(key: K, val: V) -> Self {
        Self { key, val }
    }
}

/// Record receiver shared by the sink's worker pool.
///
/// tokio's mpsc receiver is single-consumer, so workers take turns behind a
/// mutex; each lock is held for one dequeue only.
pub type SharedReceiver<K, V> = Arc<Mutex<mpsc::Receiver<Record<K, V>>>>;

/// Producer half of the pipeline.
#[async_trait]
pub trait Source<K, V>: Send + Sync {
    /// Start producing: spawn this source's workers onto `workers` and
    /// return. Every worker owns a clone of `tx`; the channel closes once
    /// all clones are dropped, which the [`Loader`] ties to the worker pool
    /// finishing.
    ///
    /// # Errors
    ///
    /// Enumeration failures (bad directory, missing completion marker) are
    /// reported here, before any worker starts.
    async fn produce(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        tx: mpsc::Sender<Record<K, V>>,
    ) -> CacheResult<()>;
}

/// Consumer half of the pipeline.
#[async_trait]
pub trait Sink<K, V>: Send + Sync {
    /// Start consuming: spawn this sink's workers onto `workers` and return.
    /// Workers drain `rx` until the channel closes.
    ///
    /// # Errors
    ///
    /// Setup failures are reported here; per-record failures are counted and
    /// logged by the workers instead of terminating the pipeline.
    async fn consume(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        rx: SharedReceiver<K, V>,
    ) -> CacheResult<()>;
}

/// Line codec used by file/object sources and the file sink.
pub trait Coder<K, V>: Send + Sync {
    /// Decode one line into a record.
    ///
    /// # Errors
    ///
    /// [`CacheError::Codec`](crate::CacheError::Codec) for a malformed line;
    /// callers count and skip.
    fn decode(&self, line: &str) -> CacheResult<Record<K, V>>;

    /// Encode a record into one line (without the trailing newline).
    ///
    /// # Errors
    ///
    /// [`CacheError::Codec`](crate::CacheError::Codec) for an unencodable
    /// record; callers count and skip.
    fn encode(&self, record: &Record<K, V>) -> CacheResult<String>;
}

/// Wires a source to a sink and runs the transfer once.
pub struct Loader<K, V> {
    source: Arc<dyn Source<K, V>>,
    sink: Arc<dyn Sink<K, V>>,
}

impl<K, V> Loader<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Create a loader over a source/sink pair.
    pub fn new(source: Arc<dyn Source<K, V>>, sink: Arc<dyn Sink<K, V>>) -> Self {
        Self { source, sink }
    }

    /// Run the transfer.
    ///
    /// Shutdown order is load-bearing: the producer pool is joined first, at
    /// which point the last sender clone has dropped and the channel is
    /// closed exactly once; the consumer pool then drains the remaining
    /// records and is joined before returning.
    ///
    /// # Errors
    ///
    /// Source or sink startup failures.
    pub async fn load(&self) -> CacheResult<()> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let rx: SharedReceiver<K, V> = Arc::new(Mutex::new(rx));

        let mut producers = JoinSet::new();
        let mut consumers = JoinSet::new();

        Arc::clone(&self.source).produce(&mut producers, tx).await?;
        Arc::clone(&self.sink)
            .consume(&mut consumers, Arc::clone(&rx))
            .await?;

        while producers.join_next().await.is_some() {}
        while consumers.join_next().await.is_some() {}

        Ok(())
    }
}
