//! In-process CDR store.

use crate::error::StoreError;
use crate::store::CdrStore;
use async_trait::async_trait;
use cdr_core::{Cdr, CdrId, LookupField};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// CDR store backed by an ordered map.
///
/// Besides the rows themselves it keeps the size of every committed
/// `save_all` transaction and the number of flushes, and it can be told to
/// fail specific calls.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<CdrId, Cdr>,
    last_id: CdrId,
    commits: Vec<usize>,
    flushes: usize,
    save_all_calls: usize,
    failing_save_all_calls: BTreeSet<usize>,
    failing_saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sizes of the committed `save_all` transactions, in commit order.
    pub fn chunk_commits(&self) -> Vec<usize> {
        self.state().commits.clone()
    }

    pub fn flushes(&self) -> usize {
        self.state().flushes
    }

    pub fn len(&self) -> usize {
        self.state().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().rows.is_empty()
    }

    pub fn rows(&self) -> Vec<Cdr> {
        self.state().rows.values().cloned().collect()
    }

    /// Make the `call`-th `save_all` (zero-based) fail without storing anything.
    pub fn fail_save_all_call(&self, call: usize) {
        self.state().failing_save_all_calls.insert(call);
    }

    /// Make the next `count` calls to `save` fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.state().failing_saves = count;
    }
}

impl MemoryState {
    fn store(&mut self, record: &Cdr) -> Result<Cdr, StoreError> {
        record.validate()?;
        let id = match record.id {
            Some(id) => {
                self.last_id = self.last_id.max(id);
                id
            }
            None => {
                self.last_id += 1;
                self.last_id
            }
        };
        let stored = record.clone().with_id(id);
        self.rows.insert(id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl CdrStore for MemoryStore {
    async fn save(&self, record: Cdr) -> Result<Cdr, StoreError> {
        let mut state = self.state();
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(StoreError::Backend("injected save failure".to_string()));
        }
        state.store(&record)
    }

    async fn save_all(&self, records: &[Cdr]) -> Result<Vec<Cdr>, StoreError> {
        let mut state = self.state();
        let call = state.save_all_calls;
        state.save_all_calls += 1;
        if state.failing_save_all_calls.contains(&call) {
            return Err(StoreError::Backend(format!(
                "injected failure on save_all call {call}"
            )));
        }
        for record in records {
            record.validate()?;
        }

        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            stored.push(state.store(record)?);
        }
        state.commits.push(stored.len());
        Ok(stored)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.state().flushes += 1;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Cdr>, StoreError> {
        Ok(self.rows())
    }

    async fn find_by_field(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Vec<Cdr>, StoreError> {
        Ok(self
            .state()
            .rows
            .values()
            .filter(|record| field.matches(record, value))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}
