//! Plain-text codec pair.
//!
//! The reference key/value types: a key whose message *is* its fingerprint
//! and a value serialized as its raw UTF-8 bytes. Useful on its own for
//! text-shaped payloads and as the model for writing custom codec pairs.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::traits::{Compressor, Serializer};

/// A plain text key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlainKey {
    /// Key content.
    pub message: String,
}

impl PlainKey {
    /// Create a key from any string-like content.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A plain text value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainValue {
    /// Value content.
    pub message: String,
}

impl PlainValue {
    /// Create a value from any string-like content.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Compressor for [`PlainKey`]: the key's message is its own fingerprint.
#[derive(Debug, Default, Clone)]
pub struct PlainCompressor;

impl Compressor<PlainKey> for PlainCompressor {
    fn compress(&self, key: &PlainKey) -> String {
        key.message.clone()
    }
}

/// Serializer for [`PlainValue`]: raw UTF-8 bytes of the message.
///
/// An empty buffer unmarshals to the empty (zero-state) value.
#[derive(Debug, Default, Clone)]
pub struct PlainSerializer;

impl Serializer<PlainValue> for PlainSerializer {
    fn marshal(&self, val: &PlainValue) -> CacheResult<Vec<u8>> {
        Ok(val.message.clone().into_bytes())
    }

    fn unmarshal(&self, buf: &[u8]) -> CacheResult<PlainValue> {
        let message = String::from_utf8(buf.to_vec()).map_err(CacheError::codec)?;
        Ok(PlainValue { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_round_trip() {
        let serializer = PlainSerializer;
        let val = PlainValue::new("hello world");
        let buf = serializer.marshal(&val).unwrap();
        assert_eq!(serializer.unmarshal(&buf).unwrap(), val);
    }

    #[test]
    fn empty_buffer_is_zero_state() {
        let serializer = PlainSerializer;
        assert_eq!(serializer.unmarshal(&[]).unwrap(), PlainValue::default());
    }

    #[test]
    fn compressor_is_deterministic() {
        let compressor = PlainCompressor;
        let key = PlainKey::new("user:42");
        assert_eq!(compressor.compress(&key), compressor.compress(&key));
        assert_eq!(compressor.compress(&key), "user:42");
    }
}
