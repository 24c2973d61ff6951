//! Error types for omnilingo-import
//!
//! Fatal errors end the run before any index is written. Per-record problems
//! (malformed rows, missing clips) are not errors at this level: they are
//! logged and show up as a pair-count discrepancy in the summary.

use crate::engine::ChunkFailure;
use std::path::PathBuf;
use thiserror::Error;

/// Import error type
#[derive(Debug, Error)]
pub enum ImportError {
    /// Dataset layout problem detected before any work starts
    #[error("Input error: {0}")]
    Input(String),

    /// Record stream failed mid-run
    #[error("Dataset read failed after {records_read} records: {message}")]
    Read { records_read: usize, message: String },

    /// Content store unreachable at startup
    #[error("Could not connect to IPFS node at {url}: {message}")]
    StoreUnavailable { url: String, message: String },

    /// Content store rejected or failed a request
    #[error("Store error: {0}")]
    Store(String),

    /// Writing ID3 tags to a clip failed
    #[error("Tag write failed for {path}: {message}")]
    Tag { path: PathBuf, message: String },

    /// One or more chunks failed (strict mode)
    #[error("{} chunk(s) failed, first: {}", .0.len(), first_failure(.0))]
    ChunksFailed(Vec<ChunkFailure>),

    /// A worker task could not be joined
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// omnilingo-common error
    #[error("Common error: {0}")]
    Common(#[from] omnilingo_common::Error),
}

fn first_failure(failures: &[ChunkFailure]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
