use crate::error::ExportError;
use crate::exporter::{with_file, SnapshotExporter};
use crate::format::SnapshotFormat;
use cdr_core::Cdr;
use std::io::Write;
use std::path::Path;

/// JSON array of record objects.
#[derive(Debug, Clone, Copy)]
pub struct JsonExporter {
    pub pretty: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl SnapshotExporter for JsonExporter {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::Json
    }

    fn write(&self, destination: &Path, records: &[Cdr]) -> Result<(), ExportError> {
        with_file(destination, |file| {
            if self.pretty {
                serde_json::to_writer_pretty(&mut *file, records)?;
            } else {
                serde_json::to_writer(&mut *file, records)?;
            }
            file.write_all(b"\n")
                .map_err(|e| ExportError::io(destination, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_core::ServiceType;
    use tempfile::TempDir;

    #[test]
    fn test_null_fields_are_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cdr.json");
        let records = vec![Cdr::new(
            "+201003",
            None,
            ServiceType::Data,
            2048.0,
            "2024-03-01T09:00:00",
        )];

        JsonExporter::default().write(&path, &records).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let object = value[0].as_object().unwrap();
        assert!(object.contains_key("bnum"));
        assert!(object["bnum"].is_null());
        assert!(object["id"].is_null());
        assert_eq!(object["serviceType"], "data");
    }

    #[test]
    fn test_compact_output_is_single_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cdr.json");
        let records = vec![Cdr::new(
            "+1",
            Some("+2".to_string()),
            ServiceType::Sms,
            1.0,
            "2024-03-01T09:00:00",
        )];

        JsonExporter { pretty: false }.write(&path, &records).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1);
    }
}
