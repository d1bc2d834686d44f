//! Snapshot exporters for CDR batches.
//!
//! Every exporter implements [`SnapshotExporter::write`]: serialize the
//! whole batch to one destination file, replacing it. All formats carry the
//! same fields (`id`, `anum`, `bnum`, `serviceType`, `usage`,
//! `startDateTime`) and spell out missing values instead of dropping them:
//!
//! | format | missing value |
//! |--------|---------------|
//! | CSV    | `null`        |
//! | JSON   | `null`        |
//! | YAML   | `null`        |
//! | XML    | `<bnum nil="true"/>` |
//!
//! Output is a pure function of the records, so exporting the same batch
//! twice yields identical bytes. [`export_all`] runs the requested formats
//! concurrently over one shared batch and reports each format separately.

pub mod csv;
pub mod error;
pub mod exporter;
pub mod format;
pub mod json;
pub mod snapshot;
pub mod xml;
pub mod yaml;

pub use error::ExportError;
pub use exporter::SnapshotExporter;
pub use format::SnapshotFormat;
pub use snapshot::{export_all, prepare_output_dir, ExportOutcome, DEFAULT_SNAPSHOT_STEM};
