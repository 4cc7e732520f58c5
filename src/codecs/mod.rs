//! Codec pair implementations.
//!
//! A codec pair is one [`Compressor`](crate::traits::Compressor) and one
//! [`Serializer`](crate::traits::Serializer) sharing the client's key/value
//! types. The built-in pair works on plain text keys and values.

mod plain;

pub use plain::{PlainCompressor, PlainKey, PlainSerializer, PlainValue};
