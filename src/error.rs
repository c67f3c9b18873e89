// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for mediashelf

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mediashelf operations
pub type Result<T> = std::result::Result<T, MediaShelfError>;

/// mediashelf error types
///
/// Only `Configuration`, `Scan` and `EngineBusy` ever reach the caller when a
/// run is started. Everything that goes wrong for a single file is logged and
/// reported through the progress stream instead.
#[derive(Error, Debug)]
pub enum MediaShelfError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Another analyze or organize run is already in progress")]
    EngineBusy,

    #[error("Background worker failed: {0}")]
    Worker(String),
}

impl MediaShelfError {
    pub(crate) fn extraction(context: impl std::fmt::Display) -> Self {
        Self::Extraction(context.to_string())
    }
}
