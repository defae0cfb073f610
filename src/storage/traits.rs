//! Storage traits and error types
//!
//! This module defines the sink interface the resume store writes through
//! and the associated error types.

use crate::output::ItemRecord;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only destination for item records
///
/// Implementations write one complete line per call; a failed call leaves
/// no partial record behind that a reader would accept.
pub trait ItemSink: Send {
    /// Appends one record
    fn append(&mut self, record: &ItemRecord) -> StorageResult<()>;

    /// Where the records go, for log messages
    fn path(&self) -> &Path;
}
