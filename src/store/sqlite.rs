// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed ordered store.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, trace};

use crate::version::Versionstamp;

use super::{OrderedStore, RangeScan, StoreEntry, StoreError, StoreOps};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key_hash     TEXT PRIMARY KEY,
    value        BLOB,
    versionstamp TEXT NOT NULL,
    expires_at   INTEGER
);
CREATE INDEX IF NOT EXISTS kv_store_expires_at
    ON kv_store (expires_at) WHERE expires_at IS NOT NULL;
CREATE INDEX IF NOT EXISTS kv_store_key_hash ON kv_store (key_hash);
";

const SQL_GET: &str = "
SELECT key_hash, value, versionstamp, expires_at FROM kv_store
WHERE key_hash = ?1 AND (expires_at IS NULL OR expires_at > ?2)";

const SQL_PUT: &str = "
INSERT INTO kv_store (key_hash, value, versionstamp, expires_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (key_hash) DO UPDATE SET
    value = excluded.value,
    versionstamp = excluded.versionstamp,
    expires_at = excluded.expires_at";

const SQL_DELETE: &str = "DELETE FROM kv_store WHERE key_hash = ?1";

const SQL_RANGE_ASC: &str = "
SELECT key_hash, value, versionstamp, expires_at FROM kv_store
WHERE key_hash >= ?1 AND key_hash < ?2 AND key_hash <> ?3
  AND (expires_at IS NULL OR expires_at > ?4)
ORDER BY key_hash ASC LIMIT ?5";

const SQL_RANGE_DESC: &str = "
SELECT key_hash, value, versionstamp, expires_at FROM kv_store
WHERE key_hash >= ?1 AND key_hash < ?2 AND key_hash <> ?3
  AND (expires_at IS NULL OR expires_at > ?4)
ORDER BY key_hash DESC LIMIT ?5";

const SQL_DELETE_EXPIRED: &str =
    "DELETE FROM kv_store WHERE expires_at IS NOT NULL AND expires_at <= ?1";

type RawRow = (String, Vec<u8>, String, Option<i64>);

/// SQLite-backed ordered store.
///
/// One WAL-mode connection guarded by a mutex; transactions hold the guard
/// for their whole extent, so primitives inside a transaction body go
/// through the transaction handle rather than the store handle.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens a store at `path`, or an in-memory store when `path` is `None`.
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let conn = match path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        // journal_mode is a query pragma: it answers with the mode in effect
        // (in-memory databases report "memory" and stay there).
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        debug!(?path, %journal_mode, "opened kv store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn decode_row((key_hash, value, versionstamp, expires_at): RawRow) -> Result<StoreEntry, StoreError> {
    let versionstamp = versionstamp
        .parse::<Versionstamp>()
        .map_err(|e| StoreError::Corruption(e.to_string()))?;
    Ok(StoreEntry {
        key_hash,
        value,
        versionstamp,
        expires_at,
    })
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn get_row(conn: &Connection, key_hash: &str, now: i64) -> Result<Option<StoreEntry>, StoreError> {
    let mut stmt = conn.prepare_cached(SQL_GET)?;
    let raw = stmt
        .query_row(params![key_hash, now], read_raw)
        .optional()?;
    raw.map(decode_row).transpose()
}

fn put_row(
    conn: &Connection,
    key_hash: &str,
    value: &[u8],
    versionstamp: Versionstamp,
    expires_at: Option<i64>,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(SQL_PUT)?;
    stmt.execute(params![key_hash, value, versionstamp.to_string(), expires_at])?;
    Ok(())
}

fn delete_row(conn: &Connection, key_hash: &str) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(SQL_DELETE)?;
    stmt.execute(params![key_hash])?;
    Ok(())
}

fn range_rows(conn: &Connection, scan: &RangeScan<'_>) -> Result<Vec<StoreEntry>, StoreError> {
    let sql = if scan.reverse {
        SQL_RANGE_DESC
    } else {
        SQL_RANGE_ASC
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(
        params![
            scan.start_hash,
            scan.end_hash,
            scan.prefix_hash,
            scan.now,
            scan.limit as i64
        ],
        read_raw,
    )?;

    let mut entries = Vec::new();
    for raw in rows {
        entries.push(decode_row(raw?)?);
    }
    Ok(entries)
}

fn delete_expired_rows(conn: &Connection, now: i64) -> Result<u64, StoreError> {
    let mut stmt = conn.prepare_cached(SQL_DELETE_EXPIRED)?;
    let removed = stmt.execute(params![now])? as u64;
    if removed > 0 {
        trace!(removed, "swept expired rows");
    }
    Ok(removed)
}

impl StoreOps for SqliteStore {
    fn get(&self, key_hash: &str, now: i64) -> Result<Option<StoreEntry>, StoreError> {
        get_row(&self.conn.lock(), key_hash, now)
    }

    fn put(
        &self,
        key_hash: &str,
        value: &[u8],
        versionstamp: Versionstamp,
        expires_at: Option<i64>,
    ) -> Result<(), StoreError> {
        put_row(&self.conn.lock(), key_hash, value, versionstamp, expires_at)
    }

    fn delete(&self, key_hash: &str) -> Result<(), StoreError> {
        delete_row(&self.conn.lock(), key_hash)
    }

    fn range(&self, scan: &RangeScan<'_>) -> Result<Vec<StoreEntry>, StoreError> {
        range_rows(&self.conn.lock(), scan)
    }

    fn delete_expired(&self, now: i64) -> Result<u64, StoreError> {
        delete_expired_rows(&self.conn.lock(), now)
    }
}

/// Primitive surface of one open transaction.
struct SqliteTxn<'a> {
    conn: &'a Connection,
}

impl StoreOps for SqliteTxn<'_> {
    fn get(&self, key_hash: &str, now: i64) -> Result<Option<StoreEntry>, StoreError> {
        get_row(self.conn, key_hash, now)
    }

    fn put(
        &self,
        key_hash: &str,
        value: &[u8],
        versionstamp: Versionstamp,
        expires_at: Option<i64>,
    ) -> Result<(), StoreError> {
        put_row(self.conn, key_hash, value, versionstamp, expires_at)
    }

    fn delete(&self, key_hash: &str) -> Result<(), StoreError> {
        delete_row(self.conn, key_hash)
    }

    fn range(&self, scan: &RangeScan<'_>) -> Result<Vec<StoreEntry>, StoreError> {
        range_rows(self.conn, scan)
    }

    fn delete_expired(&self, now: i64) -> Result<u64, StoreError> {
        delete_expired_rows(self.conn, now)
    }
}

impl OrderedStore for SqliteStore {
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreOps) -> Result<T, E>,
    {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(StoreError::from(e)))?;

        let txn = SqliteTxn { conn: &conn };
        match f(&txn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| E::from(StoreError::from(e)))?;
                Ok(value)
            }
            Err(err) => {
                // Rollback failure would mask the original error; the guard
                // drop releases the connection either way.
                let _ = conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }
}
