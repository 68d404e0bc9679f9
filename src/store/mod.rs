// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Ordered store adapter.
//!
//! The engine consumes the underlying database purely as a durable ordered
//! map keyed by hex-rendered key hashes. [`StoreOps`] is the primitive
//! surface (point CRUD, bounded range scans, expiry sweeps); it is shared
//! by the store handle and by an open transaction, so the atomic commit
//! engine runs the same primitives inside a transaction boundary.

mod error;
mod sqlite;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::version::Versionstamp;

pub use error::StoreError;
pub use sqlite::SqliteStore;

/// A raw row as the store sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// Hex rendering of the encoded key.
    pub key_hash: String,
    /// Codec output; opaque at this layer.
    pub value: Vec<u8>,
    /// Stamp assigned by the write that produced this row.
    pub versionstamp: Versionstamp,
    /// Absolute expiry in milliseconds since epoch, if any.
    pub expires_at: Option<i64>,
}

/// Bounds and options for one range scan.
#[derive(Debug, Clone)]
pub struct RangeScan<'a> {
    /// Inclusive lower bound.
    pub start_hash: &'a str,
    /// Exclusive upper bound.
    pub end_hash: &'a str,
    /// Row excluded from results (the prefix key itself); empty excludes
    /// nothing.
    pub prefix_hash: &'a str,
    /// Current time; rows expired at or before this are invisible.
    pub now: i64,
    /// Maximum rows to return.
    pub limit: usize,
    /// Scan direction. Bounds are unchanged; only the sort flips.
    pub reverse: bool,
}

/// Primitive operations over the ordered map.
///
/// Expired rows are invisible to `get` and `range` but stay on disk until
/// [`StoreOps::delete_expired`] sweeps them.
pub trait StoreOps {
    /// Reads a live row.
    fn get(&self, key_hash: &str, now: i64) -> Result<Option<StoreEntry>, StoreError>;

    /// Writes or overwrites a row.
    fn put(
        &self,
        key_hash: &str,
        value: &[u8],
        versionstamp: Versionstamp,
        expires_at: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Removes a row.
    fn delete(&self, key_hash: &str) -> Result<(), StoreError>;

    /// Scans live rows in `start_hash ≤ hash < end_hash`, skipping the
    /// prefix row, sorted by hash in scan direction.
    fn range(&self, scan: &RangeScan<'_>) -> Result<Vec<StoreEntry>, StoreError>;

    /// Removes rows whose expiry has passed; returns how many.
    fn delete_expired(&self, now: i64) -> Result<u64, StoreError>;
}

/// An ordered store with a transaction boundary.
pub trait OrderedStore: StoreOps + Send {
    /// Runs `f` inside a transaction: committed if it returns `Ok`, rolled
    /// back if it returns `Err`.
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreOps) -> Result<T, E>;
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
