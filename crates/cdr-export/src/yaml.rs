use crate::error::ExportError;
use crate::exporter::{with_file, SnapshotExporter};
use crate::format::SnapshotFormat;
use cdr_core::Cdr;
use std::path::Path;

/// YAML sequence of record mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlExporter;

impl SnapshotExporter for YamlExporter {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::Yaml
    }

    fn write(&self, destination: &Path, records: &[Cdr]) -> Result<(), ExportError> {
        with_file(destination, |file| {
            serde_yaml::to_writer(file, records)?;
            Ok(())
        })
    }
}
