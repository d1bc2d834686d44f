use cdr_core::CdrError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] CdrError),

    #[error("Sequence '{0}' returned no value")]
    Sequence(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Failure of a chunked batch write.
///
/// Chunks before `chunk_index` stay committed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("Chunk {chunk_index} failed after {committed} records were committed: {source}")]
    ChunkFailed {
        chunk_index: usize,
        committed: usize,
        #[source]
        source: StoreError,
    },

    #[error("Flush after chunk {chunk_index} failed ({committed} records committed): {source}")]
    FlushFailed {
        chunk_index: usize,
        committed: usize,
        #[source]
        source: StoreError,
    },
}

impl PersistenceError {
    /// Records durably committed before the failure.
    pub fn committed(&self) -> usize {
        match self {
            PersistenceError::InvalidChunkSize => 0,
            PersistenceError::ChunkFailed { committed, .. }
            | PersistenceError::FlushFailed { committed, .. } => *committed,
        }
    }
}
