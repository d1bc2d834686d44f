//! Chunked batch persistence.

use crate::error::PersistenceError;
use crate::store::CdrStore;
use cdr_core::Cdr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Summary of a successful [`BatchPersistor::save_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub records: Vec<Cdr>,
    /// Size of every committed chunk, in commit order.
    pub chunk_sizes: Vec<usize>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn committed(&self) -> usize {
        self.records.len()
    }
}

/// Writes a batch as a sequence of bounded transactions.
///
/// Each chunk is committed and flushed before the next one starts. A
/// failing chunk aborts the run; earlier chunks stay committed.
pub struct BatchPersistor {
    store: Arc<dyn CdrStore>,
    chunk_size: usize,
}

impl BatchPersistor {
    pub fn new(store: Arc<dyn CdrStore>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn save_all(&self, records: &[Cdr]) -> Result<BatchReport, PersistenceError> {
        if self.chunk_size == 0 {
            return Err(PersistenceError::InvalidChunkSize);
        }

        let started = Instant::now();
        let mut stored = Vec::with_capacity(records.len());
        let mut chunk_sizes = Vec::new();

        for (chunk_index, chunk) in records.chunks(self.chunk_size).enumerate() {
            let committed = stored.len();
            let saved = self.store.save_all(chunk).await.map_err(|source| {
                warn!("Chunk {chunk_index} failed, {committed} records remain committed: {source}");
                PersistenceError::ChunkFailed {
                    chunk_index,
                    committed,
                    source,
                }
            })?;
            stored.extend(saved);
            chunk_sizes.push(chunk.len());

            self.store
                .flush()
                .await
                .map_err(|source| PersistenceError::FlushFailed {
                    chunk_index,
                    committed: stored.len(),
                    source,
                })?;
            debug!(
                "Committed chunk {chunk_index} ({} records, {} total)",
                chunk.len(),
                stored.len()
            );
        }

        let elapsed = started.elapsed();
        info!(
            "Persisted {} records in {} chunks in {:?}",
            stored.len(),
            chunk_sizes.len(),
            elapsed
        );
        Ok(BatchReport {
            records: stored,
            chunk_sizes,
            elapsed,
        })
    }
}
