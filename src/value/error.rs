// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Value codec error types.

use super::codec::MAX_VALUE_SIZE;

/// Errors that can occur while encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialized value too large: {size} > {MAX_VALUE_SIZE}")]
    ValueTooLarge { size: usize },

    #[error("value serialization failed: {0}")]
    Serialization(String),

    #[error("value deserialization failed: {0}")]
    Deserialization(String),
}
