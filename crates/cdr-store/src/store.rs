use crate::error::StoreError;
use async_trait::async_trait;
use cdr_core::{Cdr, LookupField};

/// Storage operations the pipeline depends on.
///
/// Implementations assign a fresh id to every record saved without one.
#[async_trait]
pub trait CdrStore: Send + Sync {
    /// Persist one record and return it with its id.
    ///
    /// A record that already carries an id replaces the stored row with that id.
    async fn save(&self, record: Cdr) -> Result<Cdr, StoreError>;

    /// Persist all records in one transaction. Either every record is
    /// stored or none is.
    async fn save_all(&self, records: &[Cdr]) -> Result<Vec<Cdr>, StoreError>;

    /// Make prior writes durable.
    async fn flush(&self) -> Result<(), StoreError>;

    /// Every stored record in id order.
    async fn find_all(&self) -> Result<Vec<Cdr>, StoreError>;

    /// Records whose `field` equals `value`. Service types compare
    /// case-insensitively.
    async fn find_by_field(&self, field: LookupField, value: &str)
        -> Result<Vec<Cdr>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.find_all().await?.len())
    }
}
