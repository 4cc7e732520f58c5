//! JSON configuration model and factories.
//!
//! A configuration document selects which tiers to compose (`caches` is an
//! ordered list of names, each naming a sibling object carrying a `class`
//! tag plus that backend's own parameters), which codec pair to install, and
//! which source/sink the loader runs. Unknown class names surface as
//! [`CacheError::Config`].
//!
//! ```json
//! {
//!     "caches": ["hot", "store"],
//!     "hot": { "class": "MokaCache", "max_capacity": 100000, "expiration": "15m" },
//!     "store": { "class": "RedisString", "url": "redis://127.0.0.1:6379" },
//!     "compressor": { "package": "plain", "class": "Compressor" },
//!     "serializer": { "package": "plain", "class": "Serializer" }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::backends::{DashMapCache, DashMapCacheConfig};
use crate::bench::{Benchmarker, BenchmarkerBuilder, ScheduleItem, default_thresholds};
use crate::client::{KvClient, KvClientBuilder};
use crate::codecs::{PlainCompressor, PlainKey, PlainSerializer, PlainValue};
use crate::error::{CacheError, CacheResult};
use crate::loader::{
    ClientSink, ClientSinkConfig, Coder, FakeSource, FakeSourceConfig, FileSink, FileSinkConfig,
    FileSource, FileSourceConfig, FsObjectStore, Loader, MemSink, ObjectSource, ObjectSourceConfig,
    Sink, Source, TsvCoder,
};
use crate::traits::{CacheBackend, Compressor, Serializer};

#[cfg(feature = "moka")]
use crate::backends::{MokaCache, MokaCacheConfig};
#[cfg(feature = "redis")]
use crate::backends::{RedisHashCache, RedisHashCacheConfig, RedisStringCache, RedisStringCacheConfig};

/// Read and parse a JSON configuration file.
///
/// # Errors
///
/// [`CacheError::Config`] for unreadable or unparsable files.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> CacheResult<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| CacheError::Config(format!("read [{}]: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| CacheError::Config(format!("parse [{}]: {err}", path.display())))
}

/// A codec selected by package and class name.
#[derive(Debug, Clone, Deserialize)]
pub struct CodecClass {
    /// Codec package, e.g. `plain`.
    pub package: String,
    /// Class inside the package, e.g. `Compressor`.
    pub class: String,
}

/// One tier backend, tagged by class.
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
pub enum BackendConfig {
    /// In-process concurrent map tier.
    DashMapCache(DashMapCacheConfig),
    /// In-process Moka tier.
    #[cfg(feature = "moka")]
    MokaCache(MokaCacheConfig),
    /// Remote Redis string tier.
    #[cfg(feature = "redis")]
    RedisString(RedisStringCacheConfig),
    /// Remote Redis hash tier with fingerprint splitting.
    #[cfg(feature = "redis")]
    RedisHash(RedisHashCacheConfig),
}

/// Tiered client configuration.
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Ordered tier names; each names a sibling backend object.
    pub caches: Vec<String>,
    /// Key compressor; defaults to the plain codec pair.
    #[serde(default)]
    pub compressor: Option<CodecClass>,
    /// Value serializer; defaults to the plain codec pair.
    #[serde(default)]
    pub serializer: Option<CodecClass>,
    /// Sentinel buffer content for negative memoization; defaults to empty.
    #[serde(default)]
    pub nil_val_buf: Option<String>,
    /// Named backend objects referenced by `caches`.
    #[serde(flatten)]
    pub backends: HashMap<String, serde_json::Value>,
}

/// Line coder, tagged by class.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "class")]
pub enum CoderConfig {
    /// `key<TAB>value` lines.
    TsvCoder,
}

/// `FileSource` section: directory parameters plus the line coder.
#[derive(Debug, Deserialize)]
pub struct FileSourceSection {
    /// Directory and worker pool parameters.
    #[serde(flatten)]
    pub source: FileSourceConfig,
    /// Line coder.
    pub coder: CoderConfig,
}

/// `ObjectSource` section: store root, listing parameters, and the coder.
#[derive(Debug, Deserialize)]
pub struct ObjectSourceSection {
    /// Object store root directory.
    pub root: PathBuf,
    /// Listing and sharding parameters.
    #[serde(flatten)]
    pub source: ObjectSourceConfig,
    /// Line coder.
    pub coder: CoderConfig,
}

/// Loader source, tagged by class.
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
pub enum SourceConfig {
    /// Synthetic generator.
    FakeSource(FakeSourceConfig),
    /// Local-directory line files.
    FileSource(FileSourceSection),
    /// Objects under a filesystem-backed object root.
    ObjectSource(ObjectSourceSection),
}

impl SourceConfig {
    /// Override the object source's listing suffix (a no-op for other
    /// source classes). Backs the loader CLI's ad-hoc override flag.
    pub fn override_suffix(&mut self, suffix: String) {
        if let Self::ObjectSource(section) = self {
            section.source.suffix = suffix;
        }
    }
}

/// `ClientSink` section: pool/batch parameters plus the target client.
#[derive(Debug, Deserialize)]
pub struct ClientSinkSection {
    /// Worker pool and batch parameters.
    #[serde(flatten)]
    pub sink: ClientSinkConfig,
    /// The client written into.
    pub kvclient: ClientConfig,
}

/// `FileSink` section: output path parameters plus the line coder.
#[derive(Debug, Deserialize)]
pub struct FileSinkSection {
    /// Output path parameters.
    #[serde(flatten)]
    pub sink: FileSinkConfig,
    /// Line coder.
    pub coder: CoderConfig,
}

/// Loader sink, tagged by class.
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
pub enum SinkConfig {
    /// Batched writes into a tiered client.
    ClientSink(ClientSinkSection),
    /// Sharded line files.
    FileSink(FileSinkSection),
    /// In-memory vector.
    MemSink,
}

/// Loader configuration: one source, one sink.
#[derive(Debug, Deserialize)]
pub struct LoaderConfig {
    /// Record source.
    pub producer: SourceConfig,
    /// Record sink.
    pub consumer: SinkConfig,
}

/// Benchmark configuration.
#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    /// Latency thresholds as humantime strings (`"300us"`); defaults to the
    /// built-in list.
    #[serde(default)]
    pub time_distribution_threshold: Option<Vec<String>>,
    /// Reader/writer windows to run.
    pub schedule: Vec<ScheduleItem>,
    /// Client under test.
    pub kvclient: ClientConfig,
    /// Preload source.
    pub producer: SourceConfig,
}

/// Build one tier backend.
///
/// # Errors
///
/// [`CacheError::Config`] for invalid parameters, [`CacheError::Backend`]
/// when a remote tier cannot connect.
pub async fn build_backend(config: BackendConfig) -> CacheResult<Arc<dyn CacheBackend>> {
    match config {
        BackendConfig::DashMapCache(config) => Ok(Arc::new(DashMapCache::new(config))),
        #[cfg(feature = "moka")]
        BackendConfig::MokaCache(config) => Ok(Arc::new(MokaCache::new(config))),
        #[cfg(feature = "redis")]
        BackendConfig::RedisString(config) => Ok(Arc::new(RedisStringCache::new(config).await?)),
        #[cfg(feature = "redis")]
        BackendConfig::RedisHash(config) => Ok(Arc::new(RedisHashCache::new(config).await?)),
    }
}

fn build_compressor(selected: Option<&CodecClass>) -> CacheResult<Box<dyn Compressor<PlainKey>>> {
    match selected {
        None => Ok(Box::new(PlainCompressor)),
        Some(codec) if codec.package == "plain" && codec.class == "Compressor" => {
            Ok(Box::new(PlainCompressor))
        }
        Some(codec) => Err(CacheError::Config(format!(
            "no compressor named {}.{}",
            codec.package, codec.class
        ))),
    }
}

fn build_serializer(selected: Option<&CodecClass>) -> CacheResult<Box<dyn Serializer<PlainValue>>> {
    match selected {
        None => Ok(Box::new(PlainSerializer)),
        Some(codec) if codec.package == "plain" && codec.class == "Serializer" => {
            Ok(Box::new(PlainSerializer))
        }
        Some(codec) => Err(CacheError::Config(format!(
            "no serializer named {}.{}",
            codec.package, codec.class
        ))),
    }
}

fn build_coder(config: CoderConfig) -> Arc<dyn Coder<PlainKey, PlainValue>> {
    match config {
        CoderConfig::TsvCoder => Arc::new(TsvCoder),
    }
}

/// Build a tiered client from its configuration.
///
/// # Errors
///
/// [`CacheError::Config`] for missing sections or unknown class names;
/// backend construction failures pass through.
pub async fn build_client(config: &ClientConfig) -> CacheResult<KvClient<PlainKey, PlainValue>> {
    let mut builder = KvClientBuilder::new();
    for name in &config.caches {
        let section = config
            .backends
            .get(name)
            .ok_or_else(|| CacheError::Config(format!("no cache section named [{name}]")))?;
        let backend_config: BackendConfig = serde_json::from_value(section.clone())
            .map_err(|err| CacheError::Config(format!("cache [{name}]: {err}")))?;
        builder = builder.with_tier(build_backend(backend_config).await?);
    }

    builder = builder
        .with_compressor(build_compressor(config.compressor.as_ref())?)
        .with_serializer(build_serializer(config.serializer.as_ref())?);
    if let Some(sentinel) = &config.nil_val_buf {
        builder = builder.with_nil_val_buf(sentinel.clone().into_bytes());
    }

    builder.build()
}

/// Build a loader source.
#[must_use]
pub fn build_source(config: &SourceConfig) -> Arc<dyn Source<PlainKey, PlainValue>> {
    match config {
        SourceConfig::FakeSource(config) => Arc::new(FakeSource::new(*config)),
        SourceConfig::FileSource(section) => Arc::new(FileSource::new(
            section.source.clone(),
            build_coder(section.coder),
        )),
        SourceConfig::ObjectSource(section) => Arc::new(ObjectSource::new(
            section.source.clone(),
            Arc::new(FsObjectStore::new(section.root.clone())),
            build_coder(section.coder),
        )),
    }
}

/// Build a loader sink.
///
/// # Errors
///
/// Client construction failures for the `ClientSink` class.
pub async fn build_sink(config: &SinkConfig) -> CacheResult<Arc<dyn Sink<PlainKey, PlainValue>>> {
    match config {
        SinkConfig::ClientSink(section) => {
            let client = build_client(&section.kvclient).await?;
            Ok(Arc::new(ClientSink::new(section.sink, Arc::new(client))))
        }
        SinkConfig::FileSink(section) => Ok(Arc::new(FileSink::new(
            section.sink.clone(),
            build_coder(section.coder),
        ))),
        SinkConfig::MemSink => Ok(Arc::new(MemSink::new())),
    }
}

/// Build a loader from its configuration.
///
/// # Errors
///
/// Source or sink construction failures.
pub async fn build_loader(config: &LoaderConfig) -> CacheResult<Loader<PlainKey, PlainValue>> {
    let source = build_source(&config.producer);
    let sink = build_sink(&config.consumer).await?;
    Ok(Loader::new(source, sink))
}

/// Build a benchmarker from its configuration.
///
/// # Errors
///
/// [`CacheError::Config`] for unparsable thresholds; client construction
/// failures pass through.
pub async fn build_benchmarker(
    config: &BenchConfig,
) -> CacheResult<Benchmarker<PlainKey, PlainValue>> {
    let thresholds = match &config.time_distribution_threshold {
        None => default_thresholds(),
        Some(entries) => {
            let mut thresholds = Vec::with_capacity(entries.len());
            for entry in entries {
                thresholds.push(parse_threshold(entry)?);
            }
            thresholds
        }
    };

    let client = build_client(&config.kvclient).await?;
    BenchmarkerBuilder::new()
        .with_thresholds(thresholds)
        .with_schedule(config.schedule.clone())
        .with_client(Arc::new(client))
        .with_source(build_source(&config.producer))
        .build()
}

fn parse_threshold(entry: &str) -> CacheResult<Duration> {
    humantime::parse_duration(entry)
        .map_err(|err| CacheError::Config(format!("threshold [{entry}]: {err}")))
}
