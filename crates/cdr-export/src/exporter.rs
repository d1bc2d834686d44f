use crate::error::ExportError;
use crate::format::SnapshotFormat;
use cdr_core::Cdr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes a batch of records to a file in one format.
///
/// Implementations hold no state between calls and only read the records,
/// so several exporters may run over the same batch at once.
pub trait SnapshotExporter: Send + Sync {
    fn format(&self) -> SnapshotFormat;

    /// Serialize `records` to `destination`, replacing any existing file.
    fn write(&self, destination: &Path, records: &[Cdr]) -> Result<(), ExportError>;
}

/// Create `destination` and hand a buffered writer to `body`, flushing afterwards.
pub(crate) fn with_file<F>(destination: &Path, body: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ExportError>,
{
    let file = File::create(destination).map_err(|e| ExportError::io(destination, e))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)?;
    writer.flush().map_err(|e| ExportError::io(destination, e))
}
