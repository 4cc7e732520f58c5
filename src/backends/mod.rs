//! Cache backend implementations.
//!
//! Every backend implements the [`CacheBackend`](crate::traits::CacheBackend)
//! contract and can occupy any position in the tier list.
//!
//! # Available backends
//!
//! ## In-process
//! - **Moka** - concurrent cache with per-entry TTL and bounded capacity
//! - **`DashMap`** - concurrent map with a construction-time default
//!   expiration only (`set_ex` is unsupported)
//!
//! ## Remote
//! - **`RedisString`** - string-typed store, pipelined batch writes
//!   (feature: `redis`)
//! - **`RedisHash`** - field store packing many fingerprints under a
//!   bucketing key via fingerprint splitting (feature: `redis`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use tierkv::backends::{DashMapCache, DashMapCacheConfig};
//!
//! let front = DashMapCache::new(DashMapCacheConfig::default());
//! ```

pub mod dashmap_cache;

#[cfg(feature = "moka")]
pub mod moka_cache;

#[cfg(feature = "redis")]
pub mod redis_hash;
#[cfg(feature = "redis")]
pub mod redis_string;

pub use dashmap_cache::{DashMapCache, DashMapCacheConfig};

#[cfg(feature = "moka")]
pub use moka_cache::{MokaCache, MokaCacheConfig};

#[cfg(feature = "redis")]
pub use redis_hash::{RedisHashCache, RedisHashCacheConfig, split_fingerprint};
#[cfg(feature = "redis")]
pub use redis_string::{RedisStringCache, RedisStringCacheConfig};
