// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Engine façade.
//!
//! [`Database`] owns the ordered store, the value codec, and the
//! versionstamp clock, and exposes the public operation surface:
//! `get`/`get_many`/`set`/`delete`/`list`/`cleanup`/`atomic`. Every
//! operation checks the closed flag and validates keys before any I/O.
//!
//! # Example
//!
//! ```no_run
//! use opalkv::{Config, Database, Key, KeyPart, KvU64, Value};
//!
//! let db = Database::open(None, Config::default()).unwrap();
//! let hits = Key::from(vec![KeyPart::from("stats"), KeyPart::from("hits")]);
//!
//! db.set(&hits, &Value::U64(KvU64::new(0)), None).unwrap();
//! db.atomic().sum(&hits, KvU64::new(1)).unwrap().commit().unwrap();
//! ```

mod atomic;
mod error;
mod iter;
mod selector;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::key::{decode_key, encode_key, key_hash, Key, KeyLimit};
use crate::store::{now_millis, OrderedStore, SqliteStore};
use crate::value::{BinaryCodec, Value, ValueCodec};
use crate::version::{Versionstamp, VersionstampClock};

pub use atomic::{
    AtomicBatch, MAX_CHECKS, MAX_MUTATIONS, MAX_TOTAL_KEY_SIZE, MAX_TOTAL_MUTATION_SIZE,
};
pub use error::KvError;
pub use iter::ListIter;
pub use selector::Selector;

/// Maximum number of keys per [`Database::get_many`] call.
pub const MAX_GET_MANY_KEYS: usize = 10;

/// Default rows fetched per list batch.
pub const DEFAULT_LIST_BATCH_SIZE: usize = 500;

/// Maximum rows fetched per list batch.
pub const MAX_LIST_BATCH_SIZE: usize = 1000;

/// Configuration for [`Database::open`].
pub struct Config {
    /// Value codec for this store. Defaults to [`BinaryCodec`].
    pub codec: Box<dyn ValueCodec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            codec: Box::new(BinaryCodec),
        }
    }
}

/// Options for [`Database::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum entries to yield; `None` iterates until exhausted.
    pub limit: Option<usize>,
    /// Iterate from the end of the range backwards.
    pub reverse: bool,
    /// Rows fetched per batch; default 500, capped at 1000.
    pub batch_size: Option<usize>,
    /// Resume token from a previous iterator's [`ListIter::cursor`].
    pub cursor: Option<String>,
}

/// An entry as returned by reads.
///
/// `value` and `versionstamp` are `None` together when the key is absent
/// (or expired).
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Value>,
    pub versionstamp: Option<Versionstamp>,
}

/// Outcome of [`AtomicBatch::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// All checks passed and every mutation was applied with this stamp.
    Committed { versionstamp: Versionstamp },
    /// A check failed (or the batch was rolled back); nothing was applied.
    Conflict,
}

impl CommitResult {
    /// Returns true if the batch was applied.
    #[inline]
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitResult::Committed { .. })
    }

    /// Returns the batch versionstamp if the batch was applied.
    #[inline]
    pub fn versionstamp(&self) -> Option<Versionstamp> {
        match self {
            CommitResult::Committed { versionstamp } => Some(*versionstamp),
            CommitResult::Conflict => None,
        }
    }
}

/// An embeddable ordered key-value store.
///
/// Obtained from [`Database::open`]; there is no other constructor. The
/// handle is `Send + Sync` behind its internal locks and closes itself on
/// drop; after [`Database::close`] every operation fails with
/// [`KvError::DatabaseClosed`].
pub struct Database<S: OrderedStore = SqliteStore> {
    store: S,
    codec: Box<dyn ValueCodec>,
    clock: VersionstampClock,
    closed: AtomicBool,
}

impl Database<SqliteStore> {
    /// Opens a store at `path`, or an in-memory store when `path` is `None`.
    pub fn open(path: Option<&Path>, config: Config) -> Result<Self, KvError> {
        let store = SqliteStore::open(path)?;
        Ok(Self::with_store(store, config.codec))
    }
}

impl<S: OrderedStore> Database<S> {
    fn with_store(store: S, codec: Box<dyn ValueCodec>) -> Self {
        Self {
            store,
            codec,
            clock: VersionstampClock::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), KvError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::DatabaseClosed);
        }
        Ok(())
    }

    fn write_hash(&self, key: &Key) -> Result<String, KvError> {
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        let encoded = encode_key(key, KeyLimit::Write)?;
        Ok(key_hash(&encoded))
    }

    /// Reads one entry. Absent and expired keys come back with `value` and
    /// `versionstamp` unset; the returned key is the decode of the encoded
    /// key, pinning the codec round-trip.
    pub fn get(&self, key: &Key) -> Result<Entry, KvError> {
        self.ensure_open()?;
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        let encoded = encode_key(key, KeyLimit::Read)?;
        let decoded_key = decode_key(&encoded)?;

        match self.store.get(&key_hash(&encoded), now_millis())? {
            Some(row) => Ok(Entry {
                key: decoded_key,
                value: Some(self.codec.decode(&row.value)?),
                versionstamp: Some(row.versionstamp),
            }),
            None => Ok(Entry {
                key: decoded_key,
                value: None,
                versionstamp: None,
            }),
        }
    }

    /// Reads several entries, preserving input order.
    pub fn get_many(&self, keys: &[Key]) -> Result<Vec<Entry>, KvError> {
        self.ensure_open()?;
        if keys.len() > MAX_GET_MANY_KEYS {
            return Err(KvError::TooManyRanges { count: keys.len() });
        }
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Writes `value` at `key`, optionally expiring after `expire_in`.
    /// Returns the versionstamp assigned to the write.
    pub fn set(
        &self,
        key: &Key,
        value: &Value,
        expire_in: Option<Duration>,
    ) -> Result<Versionstamp, KvError> {
        self.ensure_open()?;
        let hash = self.write_hash(key)?;
        if expire_in.is_some_and(|d| d.as_millis() == 0) {
            return Err(KvError::InvalidExpiry);
        }
        let bytes = self.codec.encode(value)?;

        let versionstamp = self.clock.next();
        let expires_at = expire_in.map(|d| now_millis() + d.as_millis() as i64);
        self.store.put(&hash, &bytes, versionstamp, expires_at)?;
        Ok(versionstamp)
    }

    /// Removes `key` unconditionally.
    pub fn delete(&self, key: &Key) -> Result<(), KvError> {
        self.ensure_open()?;
        let hash = self.write_hash(key)?;
        self.store.delete(&hash)?;
        Ok(())
    }

    /// Starts a lazy iteration over the keys selected by `selector`.
    pub fn list(
        &self,
        selector: &Selector,
        options: ListOptions,
    ) -> Result<ListIter<'_, S>, KvError> {
        self.ensure_open()?;
        let batch_size = options.batch_size.unwrap_or(DEFAULT_LIST_BATCH_SIZE);
        if batch_size > MAX_LIST_BATCH_SIZE {
            return Err(KvError::TooManyEntries { batch_size });
        }
        let bounds = selector::plan(selector, options.reverse, options.cursor.as_deref())?;
        Ok(ListIter::new(
            self,
            bounds,
            options.reverse,
            batch_size.max(1),
            options.limit,
        ))
    }

    /// Physically removes expired rows; returns how many were swept.
    pub fn cleanup(&self) -> Result<u64, KvError> {
        self.ensure_open()?;
        Ok(self.store.delete_expired(now_millis())?)
    }

    /// Starts an atomic batch against this store.
    pub fn atomic(&self) -> AtomicBatch<'_, S> {
        AtomicBatch::new(self)
    }

    /// Marks the store closed. Idempotent; subsequent operations fail with
    /// [`KvError::DatabaseClosed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("kv store closed");
        }
    }

    /// Returns true once [`Database::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<S: OrderedStore> Drop for Database<S> {
    fn drop(&mut self) {
        self.close();
    }
}
