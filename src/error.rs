//! Error types shared by backends, the tiered client, and the load pipeline.
//!
//! Absence of a key is *not* an error anywhere in this crate: backends report
//! it as `Ok(None)` and the client as `Ok(None)` / `Ok(false)`. The variants
//! below cover everything else.

use thiserror::Error;

/// Result type for cache and pipeline operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error type for cache and pipeline operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An optional operation the backend does not implement.
    ///
    /// Returned (never panicked) so that callers composing heterogeneous
    /// tiers can detect the incompatibility and reconfigure.
    #[error("operation `{op}` is not supported by backend `{backend}`")]
    Unsupported {
        /// Operation name, e.g. `"set_ex"`.
        op: &'static str,
        /// Backend name as reported by [`CacheBackend::name`](crate::traits::CacheBackend::name).
        backend: &'static str,
    },

    /// Argument shape violation, detected before any I/O is attempted.
    #[error("contract violation: {0}")]
    Contract(String),

    /// Unknown backend/codec/source/sink class, or invalid construction
    /// parameters, reported at build time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Marshal/unmarshal failure in the codec pair or a line coder.
    #[error("codec error: {0}")]
    Codec(#[source] anyhow::Error),

    /// Transport, protocol, or storage failure inside a tier.
    #[error("backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

impl CacheError {
    /// Build an [`CacheError::Unsupported`] for the given operation/backend pair.
    #[must_use]
    pub fn unsupported(op: &'static str, backend: &'static str) -> Self {
        Self::Unsupported { op, backend }
    }

    /// Wrap an arbitrary failure as a backend error.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        Self::Backend(err.into())
    }

    /// Wrap an arbitrary failure as a codec error.
    pub fn codec(err: impl Into<anyhow::Error>) -> Self {
        Self::Codec(err.into())
    }

    /// Whether this error is the [`CacheError::Unsupported`] kind.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
