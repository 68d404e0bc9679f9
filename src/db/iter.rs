// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Batched lazy iteration over a planned range.

use std::collections::VecDeque;

use crate::key::{decode_key_hash, KeyPart};
use crate::store::{OrderedStore, RangeScan, StoreEntry};

use super::error::KvError;
use super::selector::{encode_cursor, ScanBounds};
use super::{Database, Entry};

/// Lazy sequence of entries produced by [`Database::list`].
///
/// Rows are fetched in batches; between batches the moving bound advances
/// past the last row seen, so concurrent writes behind the iterator are
/// never revisited. [`ListIter::cursor`] resumes iteration in a later call.
pub struct ListIter<'a, S: OrderedStore> {
    db: &'a Database<S>,
    bounds: ScanBounds,
    reverse: bool,
    batch_size: usize,
    /// Entries yielded before the iterator stops; `None` is unbounded.
    remaining: Option<usize>,
    buffer: VecDeque<Entry>,
    exhausted: bool,
    last_part: Option<KeyPart>,
}

impl<'a, S: OrderedStore> ListIter<'a, S> {
    pub(crate) fn new(
        db: &'a Database<S>,
        bounds: ScanBounds,
        reverse: bool,
        batch_size: usize,
        limit: Option<usize>,
    ) -> Self {
        Self {
            db,
            bounds,
            reverse,
            batch_size,
            remaining: limit,
            buffer: VecDeque::new(),
            exhausted: false,
            last_part: None,
        }
    }

    /// Opaque resume token for the last entry yielded; empty before any
    /// yield. Pass it to [`Database::list`] with the same selector and
    /// direction to continue where this iterator stopped.
    pub fn cursor(&self) -> String {
        match &self.last_part {
            Some(part) => encode_cursor(part).unwrap_or_default(),
            None => String::new(),
        }
    }

    fn fetch_batch(&mut self) -> Result<(), KvError> {
        self.db.ensure_open()?;

        let fetch = match self.remaining {
            Some(remaining) => self.batch_size.min(remaining),
            None => self.batch_size,
        };
        if fetch == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let rows = self.db.store.range(&RangeScan {
            start_hash: &self.bounds.start_hash,
            end_hash: &self.bounds.end_hash,
            prefix_hash: &self.bounds.prefix_hash,
            now: crate::store::now_millis(),
            limit: fetch,
            reverse: self.reverse,
        })?;

        if rows.len() < fetch {
            self.exhausted = true;
        }
        if let Some(remaining) = &mut self.remaining {
            *remaining -= rows.len();
        }

        if let Some(last) = rows.last() {
            if self.reverse {
                // The end bound is exclusive, so the last hash itself
                // resumes strictly before it.
                self.bounds.end_hash = last.key_hash.clone();
            } else {
                self.bounds.start_hash = format!("{}\0", last.key_hash);
            }
        }

        for row in rows {
            self.buffer.push_back(self.decode(row)?);
        }
        Ok(())
    }

    fn decode(&self, row: StoreEntry) -> Result<Entry, KvError> {
        let key = decode_key_hash(&row.key_hash)?;
        let value = self.db.codec.decode(&row.value)?;
        Ok(Entry {
            key,
            value: Some(value),
            versionstamp: Some(row.versionstamp),
        })
    }
}

impl<S: OrderedStore> Iterator for ListIter<'_, S> {
    type Item = Result<Entry, KvError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                self.last_part = entry.key.last().cloned();
                return Some(Ok(entry));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fetch_batch() {
                self.exhausted = true;
                return Some(Err(err));
            }
            if self.buffer.is_empty() {
                return None;
            }
        }
    }
}
