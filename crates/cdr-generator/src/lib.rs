//! Synthetic call detail record generator for cdr-sync.
//!
//! This crate provides the [`RecordFactory`] which draws plausible CDRs from a
//! set of field generators. The factory owns a seeded RNG so a fixed seed
//! reproduces the same sequence of records.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        RecordFactory         │
//! │                              │
//! │  - NumberGenerator  (anum,   │
//! │                      bnum)   │
//! │  - ServiceTypeGenerator      │
//! │  - UsageGenerator            │
//! │  - TimestampGenerator        │
//! │  - rng (StdRng)              │
//! └──────────────┬───────────────┘
//!                │
//!                ▼
//!     Cdr { anum, bnum, serviceType, usage, startDateTime }
//! ```
//!
//! # Example
//!
//! ```rust
//! use cdr_generator::RecordFactory;
//!
//! let mut factory = RecordFactory::new(42);
//! let cdr = factory.generate().unwrap();
//! assert!(cdr.validate().is_ok());
//! ```
//!
//! A draft that fails in any field generator is discarded whole; callers
//! retry with a fresh call rather than patching the failed draft.

pub mod factory;
pub mod generators;

pub use factory::{GenerationError, RecordFactory, RecordSource};
pub use generators::{NumberGenerator, ServiceTypeGenerator, TimestampGenerator, UsageGenerator};
