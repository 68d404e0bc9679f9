// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Store error types.

/// Errors that can occur in ordered-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage corruption: {0}")]
    Corruption(String),
}
