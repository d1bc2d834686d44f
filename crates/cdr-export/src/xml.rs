use crate::error::ExportError;
use crate::exporter::{with_file, SnapshotExporter};
use crate::format::SnapshotFormat;
use cdr_core::Cdr;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;
use std::path::Path;

/// `<cdrs>` document with one `<cdr>` element per record.
///
/// Absent values are written as empty elements marked `nil="true"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlExporter;

impl SnapshotExporter for XmlExporter {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::Xml
    }

    fn write(&self, destination: &Path, records: &[Cdr]) -> Result<(), ExportError> {
        with_file(destination, |file| {
            let mut writer = Writer::new_with_indent(&mut *file, b' ', 2);
            emit(
                &mut writer,
                Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
            )?;
            emit(&mut writer, Event::Start(BytesStart::new("cdrs")))?;
            for record in records {
                write_record(&mut writer, record)?;
            }
            emit(&mut writer, Event::End(BytesEnd::new("cdrs")))?;
            file.write_all(b"\n")
                .map_err(|e| ExportError::io(destination, e))
        })
    }
}

fn write_record<W: Write>(writer: &mut Writer<W>, record: &Cdr) -> Result<(), ExportError> {
    emit(writer, Event::Start(BytesStart::new("cdr")))?;
    field(writer, "id", record.id.map(|id| id.to_string()).as_deref())?;
    field(writer, "anum", Some(&record.anum))?;
    field(writer, "bnum", record.bnum.as_deref())?;
    field(writer, "serviceType", Some(record.service_type.as_str()))?;
    field(writer, "usage", Some(&record.usage.to_string()))?;
    field(writer, "startDateTime", Some(&record.start_date_time))?;
    emit(writer, Event::End(BytesEnd::new("cdr")))
}

fn field<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: Option<&str>,
) -> Result<(), ExportError> {
    match value {
        Some(value) => {
            emit(writer, Event::Start(BytesStart::new(name)))?;
            emit(writer, Event::Text(BytesText::new(value)))?;
            emit(writer, Event::End(BytesEnd::new(name)))
        }
        None => {
            let mut empty = BytesStart::new(name);
            empty.push_attribute(("nil", "true"));
            emit(writer, Event::Empty(empty))
        }
    }
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), ExportError> {
    writer
        .write_event(event)
        .map_err(|e| ExportError::Xml(e.to_string()))
}
