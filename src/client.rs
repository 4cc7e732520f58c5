//! Tiered key/value client.
//!
//! [`KvClient`] composes an ordered list of [`CacheBackend`] tiers behind a
//! single Get/Set surface. Tier 0 is the front tier (fastest, most
//! ephemeral); the last tier is authoritative. Reads promote hits toward the
//! front, misses are memoized with a sentinel buffer, and writes fan out to
//! every tier.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::traits::{CacheBackend, Compressor, Serializer};

/// Builder for [`KvClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tierkv::backends::DashMapCache;
/// use tierkv::codecs::{PlainCompressor, PlainSerializer};
/// use tierkv::KvClientBuilder;
///
/// # fn example() -> tierkv::CacheResult<()> {
/// let client = KvClientBuilder::new()
///     .with_tier(Arc::new(DashMapCache::default()))
///     .with_compressor(Box::new(PlainCompressor))
///     .with_serializer(Box::new(PlainSerializer))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct KvClientBuilder<K, V> {
    tiers: Vec<Arc<dyn CacheBackend>>,
    compressor: Option<Box<dyn Compressor<K>>>,
    serializer: Option<Box<dyn Serializer<V>>>,
    nil_val_buf: Vec<u8>,
}

impl<K, V> KvClientBuilder<K, V> {
    /// Create a builder with no tiers configured.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiers: Vec::new(),
            compressor: None,
            serializer: None,
            nil_val_buf: Vec::new(),
        }
    }

    /// Append one tier. Tiers are consulted in insertion order; the last one
    /// added is authoritative.
    #[must_use]
    pub fn with_tier(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.tiers.push(backend);
        self
    }

    /// Replace the whole tier list.
    #[must_use]
    pub fn with_tiers(mut self, tiers: Vec<Arc<dyn CacheBackend>>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Set the key compressor.
    #[must_use]
    pub fn with_compressor(mut self, compressor: Box<dyn Compressor<K>>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Set the value serializer.
    #[must_use]
    pub fn with_serializer(mut self, serializer: Box<dyn Serializer<V>>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Set the sentinel buffer that memoizes known-absent fingerprints in
    /// front tiers. Defaults to the empty buffer.
    #[must_use]
    pub fn with_nil_val_buf(mut self, buf: Vec<u8>) -> Self {
        self.nil_val_buf = buf;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when the tier list is empty or the
    /// codec pair is missing.
    pub fn build(self) -> CacheResult<KvClient<K, V>> {
        if self.tiers.is_empty() {
            return Err(CacheError::Config("tier list is empty".to_string()));
        }
        let compressor = self
            .compressor
            .ok_or_else(|| CacheError::Config("no compressor configured".to_string()))?;
        let serializer = self
            .serializer
            .ok_or_else(|| CacheError::Config("no serializer configured".to_string()))?;

        let tier_count = self.tiers.len();
        Ok(KvClient {
            tiers: self.tiers,
            compressor,
            serializer,
            nil_val_buf: self.nil_val_buf,
            get_times: (0..tier_count).map(|_| AtomicU64::new(0)).collect(),
            hit_times: (0..tier_count).map(|_| AtomicU64::new(0)).collect(),
        })
    }
}

impl<K, V> Default for KvClientBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-tier key/value client.
///
/// Generic over the user key and value types; the codec pair translates them
/// to the fingerprints and byte buffers the tiers store.
pub struct KvClient<K, V> {
    tiers: Vec<Arc<dyn CacheBackend>>,
    compressor: Box<dyn Compressor<K>>,
    serializer: Box<dyn Serializer<V>>,
    nil_val_buf: Vec<u8>,
    get_times: Vec<AtomicU64>,
    hit_times: Vec<AtomicU64>,
}

impl<K, V> KvClient<K, V> {
    /// Replace the compressor. Configuration phase only; not safe to call
    /// concurrently with operations.
    pub fn set_compressor(&mut self, compressor: Box<dyn Compressor<K>>) {
        self.compressor = compressor;
    }

    /// Replace the serializer. Configuration phase only.
    pub fn set_serializer(&mut self, serializer: Box<dyn Serializer<V>>) {
        self.serializer = serializer;
    }

    /// Replace the sentinel buffer. Configuration phase only.
    pub fn set_nil_val_buf(&mut self, buf: Vec<u8>) {
        self.nil_val_buf = buf;
    }

    /// Number of configured tiers.
    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Per-tier `(get attempts, hits)` counters, in tier order.
    ///
    /// Counters are read without locking; a concurrent operation may be
    /// partially reflected.
    #[must_use]
    pub fn tier_counters(&self) -> Vec<(u64, u64)> {
        self.get_times
            .iter()
            .zip(&self.hit_times)
            .map(|(gets, hits)| (gets.load(Ordering::Relaxed), hits.load(Ordering::Relaxed)))
            .collect()
    }

    /// Per-tier hit rate `hits / get attempts`, in tier order.
    ///
    /// A tier that was never consulted reports `NaN`.
    #[must_use]
    pub fn cache_hit_rate(&self) -> Vec<f64> {
        self.tier_counters()
            .into_iter()
            .map(|(gets, hits)| {
                #[allow(clippy::cast_precision_loss)]
                {
                    hits as f64 / gets as f64
                }
            })
            .collect()
    }

    /// Get the value stored under `key`.
    ///
    /// Tiers are consulted front to back. A hit at tier `k` back-fills every
    /// tier in front of `k` with the same buffer; a known-absent answer
    /// back-fills the front tiers with the sentinel buffer. Back-fill
    /// failures are swallowed: the front tiers are heat buffers and losing a
    /// promotion write costs a future re-read, nothing more.
    ///
    /// # Errors
    ///
    /// Surfaces the first tier read failure or an unmarshal failure.
    pub async fn get(&self, key: &K) -> CacheResult<Option<V>> {
        let fp = self.compressor.compress(key);

        let mut hit: Option<Vec<u8>> = None;
        // Promotion bound: on a full miss only the front tiers are memoized;
        // the authoritative tier is never written by a read.
        let mut idx = self.tiers.len() - 1;
        for (i, tier) in self.tiers.iter().enumerate() {
            self.get_times[i].fetch_add(1, Ordering::Relaxed);
            match tier.get(&fp).await? {
                None => {}
                Some(buf) if buf == self.nil_val_buf => {
                    // Memoized negative: the key is known-absent.
                    idx = i;
                    break;
                }
                Some(buf) => {
                    self.hit_times[i].fetch_add(1, Ordering::Relaxed);
                    hit = Some(buf);
                    idx = i;
                    break;
                }
            }
        }

        let val = match &hit {
            Some(buf) => Some(self.serializer.unmarshal(buf)?),
            None => None,
        };

        let promoted: &[u8] = hit.as_deref().unwrap_or(&self.nil_val_buf);
        for tier in &self.tiers[..idx] {
            if let Err(err) = tier.set(&fp, promoted).await {
                debug!(tier = tier.name(), error = %err, "promotion write swallowed");
            }
        }

        Ok(val)
    }

    /// Store `val` under `key` in every tier, applying each tier's default
    /// expiration.
    ///
    /// # Errors
    ///
    /// The first failing tier short-circuits the fan-out and its error is
    /// surfaced; later tiers are not written.
    pub async fn set(&self, key: &K, val: &V) -> CacheResult<()> {
        let fp = self.compressor.compress(key);
        let buf = self.serializer.marshal(val)?;

        for tier in &self.tiers {
            tier.set(&fp, &buf).await?;
        }

        Ok(())
    }

    /// Store `val` under `key` in every tier with an explicit time-to-live.
    ///
    /// # Errors
    ///
    /// Short-circuits like [`KvClient::set`]. A tier without per-entry
    /// expiration fails the whole operation with
    /// [`CacheError::Unsupported`]; that is a tier-composition problem the
    /// caller must resolve, not one the client can paper over.
    pub async fn set_ex(&self, key: &K, val: &V, ttl: Duration) -> CacheResult<()> {
        let fp = self.compressor.compress(key);
        let buf = self.serializer.marshal(val)?;

        for tier in &self.tiers {
            tier.set_ex(&fp, &buf, ttl).await?;
        }

        Ok(())
    }

    /// Remove `key` from every tier.
    ///
    /// # Errors
    ///
    /// Short-circuits at the first failing tier.
    pub async fn del(&self, key: &K) -> CacheResult<()> {
        let fp = self.compressor.compress(key);

        for tier in &self.tiers {
            tier.del(&fp).await?;
        }

        Ok(())
    }

    /// Store `val` under `key` only if absent, as judged by the
    /// authoritative tier.
    ///
    /// Front tiers are populated best-effort: their "already present" answer
    /// is advisory (a front tier may hold a stale negative or a value the
    /// authoritative tier lost) and does not short-circuit. The returned
    /// boolean is the authoritative tier's: `true` iff it inserted.
    ///
    /// # Errors
    ///
    /// Hard errors from any tier surface, including
    /// [`CacheError::Unsupported`].
    pub async fn set_nx(&self, key: &K, val: &V) -> CacheResult<bool> {
        let fp = self.compressor.compress(key);
        let buf = self.serializer.marshal(val)?;

        let Some((last, front)) = self.tiers.split_last() else {
            return Err(CacheError::Config("tier list is empty".to_string()));
        };
        for tier in front {
            tier.set_nx(&fp, &buf).await?;
        }

        last.set_nx(&fp, &buf).await
    }

    /// [`KvClient::set_nx`] with an explicit time-to-live.
    ///
    /// # Errors
    ///
    /// Same policy as [`KvClient::set_nx`].
    pub async fn set_ex_nx(&self, key: &K, val: &V, ttl: Duration) -> CacheResult<bool> {
        let fp = self.compressor.compress(key);
        let buf = self.serializer.marshal(val)?;

        let Some((last, front)) = self.tiers.split_last() else {
            return Err(CacheError::Config("tier list is empty".to_string()));
        };
        for tier in front {
            tier.set_ex_nx(&fp, &buf, ttl).await?;
        }

        last.set_ex_nx(&fp, &buf, ttl).await
    }

    /// Store many pairs in every tier.
    ///
    /// Keys are fingerprinted and values marshaled once. Front tiers are
    /// best-effort: per-entry failures are swallowed (logged only), a
    /// whole-call failure aborts. The returned per-entry vector is the
    /// authoritative tier's.
    ///
    /// # Errors
    ///
    /// [`CacheError::Contract`] when the slices differ in length (no tier is
    /// touched); otherwise the first hard tier failure.
    pub async fn set_batch(&self, keys: &[K], vals: &[V]) -> CacheResult<Vec<CacheResult<()>>> {
        if keys.len() != vals.len() {
            return Err(CacheError::Contract(format!(
                "len(keys) [{}] != len(vals) [{}]",
                keys.len(),
                vals.len()
            )));
        }

        let fps: Vec<String> = keys.iter().map(|key| self.compressor.compress(key)).collect();
        let mut bufs = Vec::with_capacity(vals.len());
        for val in vals {
            bufs.push(self.serializer.marshal(val)?);
        }

        let Some((last, front)) = self.tiers.split_last() else {
            return Err(CacheError::Config("tier list is empty".to_string()));
        };
        for tier in front {
            let results = tier.set_batch(&fps, &bufs).await?;
            let failed = results.iter().filter(|entry| entry.is_err()).count();
            if failed > 0 {
                debug!(
                    tier = tier.name(),
                    failed, "front-tier batch entries swallowed"
                );
            }
        }

        last.set_batch(&fps, &bufs).await
    }

    /// Close every tier, releasing backend resources.
    ///
    /// All tiers are attempted even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// The first close failure is surfaced after the sweep completes.
    pub async fn close(&self) -> CacheResult<()> {
        let mut first_err = None;
        for tier in &self.tiers {
            if let Err(err) = tier.close().await {
                warn!(tier = tier.name(), error = %err, "tier close failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
