// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! OpalKV: an embeddable, ordered key-value store with hierarchical tuple
//! keys, monotone versionstamps, time-bounded entries, and atomic batches.
//!
//! Keys are typed tuples encoded into lexicographically sortable byte
//! strings, so prefix and range scans over structured keys come for free.
//! Every write is stamped with a strictly monotone 80-bit versionstamp,
//! which atomic batches use for optimistic concurrency checks. Values pass
//! through a pluggable codec; 64-bit counters are a first-class value type
//! that supports wrapping `sum` and `min`/`max` mutations. Storage is a
//! single SQLite table in WAL mode, used purely as a durable ordered map.
//!
//! # Example
//!
//! ```no_run
//! use opalkv::{Config, Database, Key, KeyPart, Value};
//!
//! let db = Database::open(None, Config::default()).unwrap();
//!
//! let key = Key::from(vec![KeyPart::from("users"), KeyPart::from(42i64)]);
//! db.set(&key, &Value::from("alice"), None).unwrap();
//!
//! let entry = db.get(&key).unwrap();
//! assert_eq!(entry.value, Some(Value::from("alice")));
//! ```

pub mod db;
pub mod key;
pub mod store;
pub mod value;
pub mod version;

pub use db::{
    AtomicBatch, CommitResult, Config, Database, Entry, KvError, ListIter, ListOptions, Selector,
};
pub use key::{Key, KeyError, KeyPart};
pub use store::{OrderedStore, SqliteStore, StoreEntry, StoreError, StoreOps};
pub use value::{BinaryCodec, CodecError, JsonCodec, KvU64, Value, ValueCodec};
pub use version::{InvalidVersionstamp, Versionstamp, VersionstampClock};
