//! Two-tier in-process client walkthrough: writes, reads with promotion,
//! conditional writes, and hit-rate telemetry.
//!
//! Run with `cargo run --example basic`.

use std::sync::Arc;

use tierkv::KvClientBuilder;
use tierkv::backends::{DashMapCache, MokaCache, MokaCacheConfig};
use tierkv::codecs::{PlainCompressor, PlainKey, PlainSerializer, PlainValue};
use tierkv::loader::{FakeSource, FakeSourceConfig, Loader, MemSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let client = KvClientBuilder::new()
        .with_tier(Arc::new(MokaCache::new(MokaCacheConfig::default())))
        .with_tier(Arc::new(DashMapCache::default()))
        .with_compressor(Box::new(PlainCompressor))
        .with_serializer(Box::new(PlainSerializer))
        .build()?;

    // Fan-out write, read-through read.
    let key = PlainKey::new("user:1");
    client.set(&key, &PlainValue::new("alice")).await?;
    match client.get(&key).await? {
        Some(val) => println!("user:1 -> {}", val.message),
        None => println!("user:1 not found"),
    }

    // Conditional write: the key exists, so nothing is inserted.
    let inserted = client.set_nx(&key, &PlainValue::new("mallory")).await?;
    println!("set_nx on an existing key inserted: {inserted}");

    // Misses are memoized; the second lookup stops at the front tier.
    client.get(&PlainKey::new("user:2")).await?;
    client.get(&PlainKey::new("user:2")).await?;
    println!("per-tier hit rate: {:?}", client.cache_hit_rate());

    // Bulk-load a synthetic working set into memory.
    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        total: 1000,
        ..FakeSourceConfig::default()
    }));
    let sink = Arc::new(MemSink::new());
    Loader::new(source, sink.clone()).load().await?;
    println!("preloaded {} synthetic records", sink.len());

    client.close().await?;
    Ok(())
}
