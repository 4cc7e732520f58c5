//! Tab-separated line coder.

use anyhow::anyhow;

use crate::codecs::{PlainKey, PlainValue};
use crate::error::{CacheError, CacheResult};
use crate::loader::{Coder, Record};

/// Coder for `key<TAB>value` lines over the plain codec types.
///
/// A line with any other number of TAB-separated fields is a decode error.
#[derive(Debug, Default, Clone)]
pub struct TsvCoder;

impl Coder<PlainKey, PlainValue> for TsvCoder {
    fn decode(&self, line: &str) -> CacheResult<Record<PlainKey, PlainValue>> {
        let fields: Vec<&str> = line.split('\t').collect();
        let [key, val] = fields.as_slice() else {
            return Err(CacheError::Codec(anyhow!(
                "expected 2 tab-separated fields, got {}. line [{line}]",
                fields.len()
            )));
        };

        Ok(Record::new(PlainKey::new(*key), PlainValue::new(*val)))
    }

    fn encode(&self, record: &Record<PlainKey, PlainValue>) -> CacheResult<String> {
        Ok(format!("{}\t{}", record.key.message, record.val.message))
    }
}
