// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Public engine error type.

use crate::key::KeyError;
use crate::store::StoreError;
use crate::value::CodecError;
use crate::version::InvalidVersionstamp;

use super::atomic::{
    MAX_CHECKS, MAX_MUTATIONS, MAX_TOTAL_KEY_SIZE, MAX_TOTAL_MUTATION_SIZE,
};
use super::MAX_GET_MANY_KEYS;
use super::MAX_LIST_BATCH_SIZE;

/// Errors raised by the engine.
///
/// A failed optimistic check is not an error; it is
/// [`CommitResult::Conflict`](super::CommitResult::Conflict).
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("database closed")]
    DatabaseClosed,

    #[error("key must have at least one part")]
    EmptyKey,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Versionstamp(#[from] InvalidVersionstamp),

    #[error("expiry must be a positive number of milliseconds")]
    InvalidExpiry,

    #[error("start key is outside the prefix keyspace")]
    PrefixBoundsViolation,

    #[error("start key sorts after end key")]
    StartAfterEnd,

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("too many keys ({count} > {MAX_GET_MANY_KEYS})")]
    TooManyRanges { count: usize },

    #[error("batch size too large ({batch_size} > {MAX_LIST_BATCH_SIZE})")]
    TooManyEntries { batch_size: usize },

    #[error("too many checks ({count} > {MAX_CHECKS})")]
    TooManyChecks { count: usize },

    #[error("too many mutations ({count} > {MAX_MUTATIONS})")]
    TooManyMutations { count: usize },

    #[error("total key size too large ({size} > {MAX_TOTAL_KEY_SIZE})")]
    TotalKeySizeExceeded { size: usize },

    #[error("total mutation size too large ({size} > {MAX_TOTAL_MUTATION_SIZE})")]
    TotalMutationSizeExceeded { size: usize },

    #[error("serialized value too large ({size} bytes)")]
    ValueTooLarge { size: usize },

    #[error("failed to perform '{op}' mutation on a non-U64 value in the database")]
    NotACounter { op: &'static str },

    #[error("value codec: {0}")]
    Serialization(CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CodecError> for KvError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::ValueTooLarge { size } => KvError::ValueTooLarge { size },
            other => KvError::Serialization(other),
        }
    }
}
