// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key codec error types.

/// Errors that can occur while encoding or decoding keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("encoded key too large: {size} > {max}")]
    KeySizeExceeded { size: usize, max: usize },

    #[error("invalid key hash: {0}")]
    InvalidKeyHash(String),
}
