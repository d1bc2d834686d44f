//! Core types for cdr-sync.
//!
//! This crate provides the call detail record (CDR) model shared by every
//! other crate in the workspace:
//!
//! - [`Cdr`] - One billable usage event
//! - [`ServiceType`] - `call`, `sms` or `data`
//! - [`query`] - In-memory filters, orderings and aggregates over record lists
//!
//! # Architecture
//!
//! ```text
//! cdr-core (this crate)
//!    │
//!    ├─── cdr-generator        (produces Cdr values)
//!    ├─── generation-pipeline  (moves Cdr values through the bounded queue)
//!    ├─── cdr-store            (persists Cdr values, assigns ids)
//!    ├─── cdr-replication      (Cdr <-> JSON wire payloads)
//!    └─── cdr-export           (Cdr -> snapshot files)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cdr_core::{Cdr, ServiceType};
//!
//! let cdr = Cdr::new("+201001234567", None, ServiceType::Data, 52_428.0, "2024-05-01T10:15:00");
//! assert!(cdr.validate().is_ok());
//! assert!(cdr.id.is_none());
//! ```

pub mod error;
pub mod query;
pub mod record;
pub mod service;

pub use error::CdrError;
pub use query::{RevenueLine, RevenueReport, SortKey};
pub use record::{Cdr, CdrId, LookupField, DATE_TIME_FORMAT};
pub use service::ServiceType;
