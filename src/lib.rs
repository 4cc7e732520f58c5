//! Tiered KV Client
//!
//! A multi-tier key/value client for Rust featuring:
//! - **Tiered reads**: front tiers answer first, hits are promoted forward
//! - **Negative memoization**: known-absent keys are memoized in front tiers
//!   with a sentinel buffer
//! - **Write fan-out**: writes go to every tier, short-circuiting on failure
//! - **Pluggable backends**: in-process (Moka, `DashMap`) and remote (Redis
//!   string/hash) tiers behind one contract
//! - **Bulk loading**: a producer/consumer pipeline streaming records from
//!   files, object listings, or a synthetic generator into any sink
//! - **Benchmarking**: schedule-driven replay with latency distribution KPIs
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tierkv::backends::{DashMapCache, MokaCache, MokaCacheConfig};
//! use tierkv::codecs::{PlainCompressor, PlainKey, PlainSerializer, PlainValue};
//! use tierkv::KvClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> tierkv::CacheResult<()> {
//!     let client = KvClientBuilder::new()
//!         .with_tier(Arc::new(MokaCache::new(MokaCacheConfig::default())))
//!         .with_tier(Arc::new(DashMapCache::default()))
//!         .with_compressor(Box::new(PlainCompressor))
//!         .with_serializer(Box::new(PlainSerializer))
//!         .build()?;
//!
//!     client
//!         .set(&PlainKey::new("user:1"), &PlainValue::new("alice"))
//!         .await?;
//!
//!     if let Some(val) = client.get(&PlainKey::new("user:1")).await? {
//!         println!("cached: {}", val.message);
//!     }
//!
//!     println!("hit rates: {:?}", client.cache_hit_rate());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Get ──→ tier 0 (front) ──→ tier 1 ──→ … ──→ tier n-1 (authoritative)
//!          ↑ promote hit      ↑ promote       ↓ miss
//!          ← sentinel memo on known-absent    (false, none)
//! Set ──→ every tier, in order, first failure surfaces
//! ```
//!
//! The bulk loader (`kvloader`) and benchmark driver (`kvbench`) binaries
//! run the [`loader`] pipeline and the [`bench`] schedule from a JSON
//! configuration document; see [`config`].

pub mod backends;
pub mod bench;
pub mod client;
pub mod codecs;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;

pub use bench::{Benchmarker, BenchmarkerBuilder, Kpi, ScheduleItem};
pub use client::{KvClient, KvClientBuilder};
pub use error::{CacheError, CacheResult};
pub use loader::{Coder, Loader, Record, Sink, Source};
pub use traits::{CacheBackend, Compressor, Serializer};

// Re-export async_trait for backend implementors.
pub use async_trait::async_trait;
