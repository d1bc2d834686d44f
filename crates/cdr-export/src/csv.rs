use crate::error::ExportError;
use crate::exporter::{with_file, SnapshotExporter};
use crate::format::SnapshotFormat;
use cdr_core::Cdr;
use std::path::Path;

pub const CSV_HEADER: [&str; 6] = ["id", "anum", "bnum", "serviceType", "usage", "startDateTime"];

/// Written for absent `id` and `bnum` values.
pub const CSV_NULL: &str = "null";

/// Comma-separated export with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl SnapshotExporter for CsvExporter {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::Csv
    }

    fn write(&self, destination: &Path, records: &[Cdr]) -> Result<(), ExportError> {
        with_file(destination, |file| {
            let mut writer = ::csv::Writer::from_writer(file);
            writer.write_record(CSV_HEADER)?;
            for record in records {
                let id = record
                    .id
                    .map_or_else(|| CSV_NULL.to_string(), |id| id.to_string());
                writer.write_record([
                    id.as_str(),
                    record.anum.as_str(),
                    record.bnum.as_deref().unwrap_or(CSV_NULL),
                    record.service_type.as_str(),
                    record.usage.to_string().as_str(),
                    record.start_date_time.as_str(),
                ])?;
            }
            writer
                .flush()
                .map_err(|e| ExportError::io(destination, e))
        })
    }
}
