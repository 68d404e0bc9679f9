// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Range planner: selectors, hash-range bounds, and resume cursors.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::key::{decode_key, encode_key, key_hash, Key, KeyLimit, KeyPart};

use super::error::KvError;

/// Describes which range of keys a list operation traverses.
///
/// Exactly one of four shapes; malformed combinations (a lone start, both
/// bounds alongside a prefix) cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// All keys strictly under a prefix. The empty prefix selects the whole
    /// keyspace.
    Prefix(Key),
    /// Keys under `prefix` starting at `start` (inclusive); `start` must be
    /// a strict extension of `prefix`.
    PrefixStart { prefix: Key, start: Key },
    /// Keys under `prefix` up to `end` (exclusive); `end` must be a strict
    /// extension of `prefix`.
    PrefixEnd { prefix: Key, end: Key },
    /// Keys in `[start, end)`.
    Range { start: Key, end: Key },
}

/// Hex bounds of a planned scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanBounds {
    pub start_hash: String,
    pub end_hash: String,
    pub prefix_hash: String,
}

fn hash_of(key: &Key) -> Result<String, KvError> {
    Ok(key_hash(&encode_key(key, KeyLimit::Read)?))
}

/// Computes scan bounds for a selector, folding in an optional resume
/// cursor for the given direction.
pub(crate) fn plan(
    selector: &Selector,
    reverse: bool,
    cursor: Option<&str>,
) -> Result<ScanBounds, KvError> {
    let mut bounds = match selector {
        Selector::Prefix(prefix) if prefix.is_empty() => ScanBounds {
            start_hash: String::new(),
            end_hash: "ffff".to_string(),
            prefix_hash: String::new(),
        },
        Selector::Prefix(prefix) => {
            let prefix_hash = hash_of(prefix)?;
            ScanBounds {
                start_hash: prefix_hash.clone(),
                end_hash: format!("{prefix_hash}ff"),
                prefix_hash,
            }
        }
        Selector::PrefixStart { prefix, start } => {
            if !prefix.is_strict_prefix_of(start) {
                return Err(KvError::PrefixBoundsViolation);
            }
            let prefix_hash = hash_of(prefix)?;
            ScanBounds {
                start_hash: hash_of(start)?,
                end_hash: format!("{prefix_hash}ff"),
                prefix_hash,
            }
        }
        Selector::PrefixEnd { prefix, end } => {
            if !prefix.is_strict_prefix_of(end) {
                return Err(KvError::PrefixBoundsViolation);
            }
            let prefix_hash = hash_of(prefix)?;
            ScanBounds {
                start_hash: prefix_hash.clone(),
                end_hash: hash_of(end)?,
                prefix_hash,
            }
        }
        Selector::Range { start, end } => {
            let start_hash = hash_of(start)?;
            let end_hash = hash_of(end)?;
            if start_hash > end_hash {
                return Err(KvError::StartAfterEnd);
            }
            ScanBounds {
                start_hash,
                end_hash,
                prefix_hash: String::new(),
            }
        }
    };

    if let Some(cursor) = cursor {
        let part = decode_cursor(cursor)?;
        let resumed = resume_key(selector, part);
        let hash = hash_of(&resumed)?;
        if reverse {
            // Resume strictly before the cursor key.
            bounds.end_hash = hash;
        } else {
            // "\0" sorts immediately after the hash itself: strictly after.
            bounds.start_hash = format!("{hash}\0");
        }
    }

    Ok(bounds)
}

/// Rebuilds the key a cursor points at: the selector's base plus the
/// cursor's last part.
fn resume_key(selector: &Selector, part: KeyPart) -> Key {
    match selector {
        Selector::Prefix(prefix)
        | Selector::PrefixStart { prefix, .. }
        | Selector::PrefixEnd { prefix, .. } => prefix.with_part(part),
        Selector::Range { start, .. } => {
            let base: Vec<KeyPart> = start.parts()[..start.len().saturating_sub(1)].to_vec();
            Key::new(base).with_part(part)
        }
    }
}

/// Renders a cursor for the last-yielded key's last part.
pub(crate) fn encode_cursor(part: &KeyPart) -> Result<String, KvError> {
    let encoded = encode_key(&Key::from(part.clone()), KeyLimit::Read)?;
    Ok(URL_SAFE_NO_PAD.encode(encoded))
}

/// Decodes a cursor back into the single key part it carries.
pub(crate) fn decode_cursor(cursor: &str) -> Result<KeyPart, KvError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| KvError::InvalidCursor)?;
    let key = decode_key(&bytes).map_err(|_| KvError::InvalidCursor)?;
    match key.parts() {
        [part] => Ok(part.clone()),
        _ => Err(KvError::InvalidCursor),
    }
}
