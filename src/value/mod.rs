// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Values and the pluggable value codec boundary.
//!
//! The engine treats stored values as opaque except for one sentinel: the
//! [`KvU64`] counter, the only value type that participates in `sum`,
//! `min`, and `max` mutations. Codecs must keep counters self-identifying
//! in their output so a counter round-trips as a counter, never as a plain
//! integer.

mod codec;
mod error;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{BinaryCodec, JsonCodec, ValueCodec, MAX_VALUE_SIZE};
pub use error::CodecError;

/// The 64-bit unsigned counter sentinel.
///
/// `u64` is exactly the counter domain, so out-of-range construction is
/// unrepresentable. `sum` wraps modulo 2^64.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct KvU64(u64);

impl KvU64 {
    /// Creates a counter.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the counter value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Wrapping addition modulo 2^64.
    #[inline]
    pub fn wrapping_sum(self, other: KvU64) -> KvU64 {
        KvU64(self.0.wrapping_add(other.0))
    }
}

impl From<u64> for KvU64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for KvU64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A storable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// The counter sentinel; see [`KvU64`].
    U64(KvU64),
}

impl Value {
    /// Returns the counter if this value is the counter sentinel.
    #[inline]
    pub fn as_u64(&self) -> Option<KvU64> {
        match self {
            Value::U64(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns true if this value is the counter sentinel.
    #[inline]
    pub fn is_counter(&self) -> bool {
        matches!(self, Value::U64(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<KvU64> for Value {
    fn from(counter: KvU64) -> Self {
        Value::U64(counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_wrapping_sum() {
        let max = KvU64::new(u64::MAX);
        assert_eq!(max.wrapping_sum(KvU64::new(10)), KvU64::new(9));
        assert_eq!(KvU64::new(1).wrapping_sum(KvU64::new(2)), KvU64::new(3));
    }

    #[test]
    fn test_counter_sentinel_detection() {
        assert!(Value::from(KvU64::new(1)).is_counter());
        assert_eq!(Value::from(KvU64::new(1)).as_u64(), Some(KvU64::new(1)));
        // A plain integer is not a counter.
        assert!(!Value::from(1i64).is_counter());
        assert_eq!(Value::from(1i64).as_u64(), None);
    }
}
