//! On-disk inverted index for log entries
//!
//! Owns the index lifecycle (schema, writer, reader) and adapts the
//! engine's native full-text query trees onto it. Ingestion writes batches
//! through [`IndexManager`]; the query engine reads through
//! [`TantivyIndex`], which implements the `FullTextIndex` seam.

mod backend;
mod document;
mod manager;

use crate::error::AppError;

pub use backend::TantivyIndex;
pub use document::{build_entry_schema, entry_to_doc};
pub use manager::IndexManager;

/// Errors from the index write path and lifecycle
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index initialization failed: {0}")]
    Init(String),

    #[error("indexing failed: {0}")]
    Indexing(String),
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        AppError::Internal(err.to_string())
    }
}
