// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Value codec trait and the built-in codec implementations.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::error::CodecError;
use super::{KvU64, Value};

/// Maximum serialized value size in bytes. The codec's own framing counts
/// against this budget.
pub const MAX_VALUE_SIZE: usize = 65536;

/// The encode/decode boundary between the engine and stored bytes.
///
/// Implementations must be self-describing enough that a [`KvU64`] counter
/// decodes back as a counter, and must reject output larger than
/// [`MAX_VALUE_SIZE`].
pub trait ValueCodec: Send + Sync {
    /// Serializes a value.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Deserializes a value; the exact inverse of [`ValueCodec::encode`].
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

fn check_size(bytes: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    if bytes.len() > MAX_VALUE_SIZE {
        return Err(CodecError::ValueTooLarge { size: bytes.len() });
    }
    Ok(bytes)
}

/// Structured-binary codec (postcard). The default.
///
/// The [`Value`] tree is the schema, so every variant, counters included,
/// is self-identifying in the byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl ValueCodec for BinaryCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let bytes = postcard::to_allocvec(value)
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        check_size(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}

/// Marker key for byte strings in JSON output.
const JSON_BYTES_KEY: &str = "$bytes";
/// Marker key for counters in JSON output.
const JSON_U64_KEY: &str = "$u64";
/// Marker key wrapping maps whose own keys collide with a marker.
const JSON_MAP_KEY: &str = "$map";

/// Textual JSON codec.
///
/// Byte strings are stored base64-encoded and counters as decimal strings,
/// each under a single-key marker object; user maps that contain a marker
/// key are wrapped under `"$map"` so they cannot be confused with markers.
/// Non-finite floats are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

fn marker(key: &str, value: serde_json::Value) -> serde_json::Value {
    let mut object = serde_json::Map::with_capacity(1);
    object.insert(key.to_string(), value);
    serde_json::Value::Object(object)
}

impl JsonCodec {
    fn to_json(value: &Value) -> Result<serde_json::Value, CodecError> {
        let json = match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    CodecError::Serialization(format!("non-finite float {f} has no JSON form"))
                })?,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => marker(
                JSON_BYTES_KEY,
                serde_json::Value::String(BASE64.encode(bytes)),
            ),
            Value::U64(counter) => marker(
                JSON_U64_KEY,
                serde_json::Value::String(counter.value().to_string()),
            ),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Self::to_json).collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let object: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Self::to_json(v)?)))
                    .collect::<Result<_, CodecError>>()?;
                let reserved = map
                    .keys()
                    .any(|k| k == JSON_BYTES_KEY || k == JSON_U64_KEY || k == JSON_MAP_KEY);
                if reserved {
                    marker(JSON_MAP_KEY, serde_json::Value::Object(object))
                } else {
                    serde_json::Value::Object(object)
                }
            }
        };
        Ok(json)
    }

    fn from_json(json: &serde_json::Value) -> Result<Value, CodecError> {
        let value = match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    return Err(CodecError::Deserialization(format!(
                        "number {n} fits neither i64 nor f64"
                    )));
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(
                items.iter().map(Self::from_json).collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(object) => {
                if object.len() == 1 {
                    if let Some(encoded) = object.get(JSON_BYTES_KEY).and_then(|v| v.as_str()) {
                        let bytes = BASE64.decode(encoded).map_err(|e| {
                            CodecError::Deserialization(format!("bad base64 byte payload: {e}"))
                        })?;
                        return Ok(Value::Bytes(bytes));
                    }
                    if let Some(digits) = object.get(JSON_U64_KEY).and_then(|v| v.as_str()) {
                        let counter = digits.parse::<u64>().map_err(|e| {
                            CodecError::Deserialization(format!("bad counter payload: {e}"))
                        })?;
                        return Ok(Value::U64(KvU64::new(counter)));
                    }
                    if let Some(serde_json::Value::Object(inner)) = object.get(JSON_MAP_KEY) {
                        return Self::decode_map(inner);
                    }
                }
                Self::decode_map(object)?
            }
        };
        Ok(value)
    }

    fn decode_map(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Value, CodecError> {
        let map = object
            .iter()
            .map(|(k, v)| Ok((k.clone(), Self::from_json(v)?)))
            .collect::<Result<_, CodecError>>()?;
        Ok(Value::Map(map))
    }
}

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let json = Self::to_json(value)?;
        let bytes = serde_json::to_vec(&json)
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        check_size(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let json: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::Deserialization(e.to_string()))?;
        Self::from_json(&json)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            // Finite floats only so the JSON codec accepts them too.
            (-1.0e12f64..1.0e12).prop_map(Value::Float),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
            any::<u64>().prop_map(|v| Value::U64(KvU64::new(v))),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::btree_map("[a-z$]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn binary_roundtrip(value in arb_value()) {
            let bytes = BinaryCodec.encode(&value).unwrap();
            prop_assert_eq!(BinaryCodec.decode(&bytes).unwrap(), value);
        }

        #[test]
        fn json_roundtrip(value in arb_value()) {
            let bytes = JsonCodec.encode(&value).unwrap();
            prop_assert_eq!(JsonCodec.decode(&bytes).unwrap(), value);
        }

        #[test]
        fn counters_never_decode_as_integers(counter in any::<u64>()) {
            for codec in [&BinaryCodec as &dyn ValueCodec, &JsonCodec] {
                let bytes = codec.encode(&Value::U64(KvU64::new(counter))).unwrap();
                prop_assert!(codec.decode(&bytes).unwrap().is_counter());
            }
        }
    }
}
