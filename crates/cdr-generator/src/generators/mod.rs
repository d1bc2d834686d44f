//! Field generators used by the record factory.
//!
//! Each generator draws one part of a record from the RNG it is handed and
//! may fail, in which case the whole draft is discarded.

pub mod number;
pub mod service;
pub mod timestamp;
pub mod usage;

pub use number::NumberGenerator;
pub use service::ServiceTypeGenerator;
pub use timestamp::TimestampGenerator;
pub use usage::UsageGenerator;
