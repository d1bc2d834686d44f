//! Storage for call detail records.
//!
//! [`CdrStore`] is the collaborator both write paths depend on: the
//! generation path persists batches through [`BatchPersistor`], the replay
//! path saves one record at a time. Two backends are provided:
//!
//! - [`SurrealStore`]: SurrealDB table with sequence-assigned numeric ids
//! - [`MemoryStore`]: in-process store that also records chunk commits
//!   and flushes, used by tests and dry runs

pub mod connect;
pub mod error;
pub mod memory;
pub mod persistor;
pub mod store;
pub mod surreal;

pub use connect::{surreal_connect, surreal_connect_with_retries, SurrealOpts};
pub use error::{PersistenceError, StoreError};
pub use memory::MemoryStore;
pub use persistor::{BatchPersistor, BatchReport, DEFAULT_CHUNK_SIZE};
pub use store::CdrStore;
pub use surreal::SurrealStore;
