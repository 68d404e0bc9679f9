// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Tuple keys and the ordered binary key codec.
//!
//! A key is a tuple of typed parts. Each part is encoded as a one-byte type
//! tag, a payload, and a single 0x00 terminator; parts are concatenated, and
//! the result sorts lexicographically in tuple order. The store keys rows by
//! the lowercase-hex rendering of the encoded bytes, so SQLite's default
//! text collation preserves the same order.
//!
//! Because the tag is the first byte of every part, parts of different types
//! partition by tag: bytes < strings < integers < doubles < booleans.

mod codec;
mod error;
mod part;

pub use codec::{
    decode_key, decode_key_hash, encode_key, key_hash, KeyLimit, MAX_READ_KEY_SIZE,
    MAX_WRITE_KEY_SIZE,
};
pub use error::KeyError;
pub use part::{Key, KeyPart};
