//! Backend and codec contracts.
//!
//! Three abstractions make the tiered client pluggable:
//!
//! - [`CacheBackend`]: a single storage tier operating on fingerprints and
//!   opaque byte buffers. Optional operations (`set_ex`, `set_nx`,
//!   `set_ex_nx`) default to a typed [`CacheError::Unsupported`] so that a
//!   backend only implements what its store can honor.
//! - [`Compressor`]: derives the deterministic string fingerprint from a
//!   user key.
//! - [`Serializer`]: marshals user values to and from byte buffers.
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use tierkv::{CacheBackend, CacheResult, async_trait};
//!
//! struct MyStore { /* ... */ }
//!
//! #[async_trait]
//! impl CacheBackend for MyStore {
//!     async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
//!         // Ok(None) when the key is absent; Err(..) only for store failures.
//!     }
//!     // set / del / set_batch ... ; optional ops inherit `Unsupported`.
//!     fn name(&self) -> &'static str {
//!         "MyStore"
//!     }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, CacheResult};

/// Derives a fingerprint from a user key.
///
/// Must be deterministic: equal keys yield equal fingerprints. The
/// fingerprint is the key every tier stores under.
pub trait Compressor<K>: Send + Sync {
    /// Compress a user key into its fingerprint.
    fn compress(&self, key: &K) -> String;
}

/// Marshals user values to and from opaque byte buffers.
///
/// `unmarshal` must tolerate an empty buffer and produce the value's zero
/// state from it; an empty encoded value is legal and distinct from absence.
pub trait Serializer<V>: Send + Sync {
    /// Encode a value into a byte buffer.
    fn marshal(&self, val: &V) -> CacheResult<Vec<u8>>;

    /// Decode a value from a byte buffer.
    fn unmarshal(&self, buf: &[u8]) -> CacheResult<V>;
}

/// One storage tier: a key/value store addressed by fingerprint.
///
/// # Not-found semantics
///
/// `get` returns `Ok(None)` when the fingerprint is not stored. An `Err` is
/// reserved for transport/protocol/disk failures. `del` of an absent key is
/// not an error.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; the client never wraps backend
/// calls in an external lock.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the buffer stored under `key`.
    ///
    /// `Ok(Some(buf))` on hit (the buffer may be empty), `Ok(None)` when the
    /// key is not stored.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `val` under `key`, applying the backend's configured default
    /// expiration (or none).
    async fn set(&self, key: &str, val: &[u8]) -> CacheResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Store many pairs.
    ///
    /// Fails fast with [`CacheError::Contract`] when `keys` and `vals`
    /// differ in length, before any I/O. The outer error means the call as a
    /// whole failed; `Ok(results)` carries a per-entry outcome vector.
    ///
    /// Backends with a pipelined wire protocol should batch on the wire;
    /// others may delegate to [`set_batch_serial`].
    async fn set_batch(
        &self,
        keys: &[String],
        vals: &[Vec<u8>],
    ) -> CacheResult<Vec<CacheResult<()>>>;

    /// Store `val` under `key` with an explicit time-to-live.
    ///
    /// Backends without per-entry expiration return
    /// [`CacheError::Unsupported`].
    async fn set_ex(&self, key: &str, val: &[u8], ttl: Duration) -> CacheResult<()> {
        let _ = (key, val, ttl);
        Err(CacheError::unsupported("set_ex", self.name()))
    }

    /// Store `val` under `key` only if the key is absent.
    ///
    /// Returns `Ok(true)` iff the value was inserted. The backend's default
    /// expiration applies.
    async fn set_nx(&self, key: &str, val: &[u8]) -> CacheResult<bool> {
        let _ = (key, val);
        Err(CacheError::unsupported("set_nx", self.name()))
    }

    /// Store `val` under `key` with an explicit time-to-live, only if the
    /// key is absent.
    async fn set_ex_nx(&self, key: &str, val: &[u8], ttl: Duration) -> CacheResult<bool> {
        let _ = (key, val, ttl);
        Err(CacheError::unsupported("set_ex_nx", self.name()))
    }

    /// Release backend resources. Idempotent.
    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }

    /// Backend name for logs and error messages.
    fn name(&self) -> &'static str;
}

/// Checks the length contract shared by every `set_batch` implementation.
pub fn check_batch_shape(keys: &[String], vals: &[Vec<u8>]) -> CacheResult<()> {
    if keys.len() == vals.len() {
        Ok(())
    } else {
        Err(CacheError::Contract(format!(
            "len(keys) [{}] != len(vals) [{}]",
            keys.len(),
            vals.len()
        )))
    }
}

/// Serial `set_batch` fallback for backends without a wire-level batch write.
pub async fn set_batch_serial<B>(
    backend: &B,
    keys: &[String],
    vals: &[Vec<u8>],
) -> CacheResult<Vec<CacheResult<()>>>
where
    B: CacheBackend + ?Sized,
{
    check_batch_shape(keys, vals)?;

    let mut results = Vec::with_capacity(keys.len());
    for (key, val) in keys.iter().zip(vals) {
        results.push(backend.set(key, val).await);
    }

    Ok(results)
}

/// Get-then-set fallback for `set_nx` on backends without a native
/// conditional write. Not atomic across concurrent writers.
pub async fn set_nx_via_get<B>(backend: &B, key: &str, val: &[u8]) -> CacheResult<bool>
where
    B: CacheBackend + ?Sized,
{
    if backend.get(key).await?.is_some() {
        return Ok(false);
    }

    backend.set(key, val).await?;
    Ok(true)
}

/// Get-then-set fallback for `set_ex_nx`. Not atomic across concurrent
/// writers.
pub async fn set_ex_nx_via_get<B>(
    backend: &B,
    key: &str,
    val: &[u8],
    ttl: Duration,
) -> CacheResult<bool>
where
    B: CacheBackend + ?Sized,
{
    if backend.get(key).await?.is_some() {
        return Ok(false);
    }

    backend.set_ex(key, val, ttl).await?;
    Ok(true)
}
