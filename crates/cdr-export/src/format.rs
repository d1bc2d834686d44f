use crate::csv::CsvExporter;
use crate::error::ExportError;
use crate::exporter::SnapshotExporter;
use crate::json::JsonExporter;
use crate::xml::XmlExporter;
use crate::yaml::YamlExporter;
use std::fmt;
use std::str::FromStr;

/// Snapshot serialization, keyed by its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum SnapshotFormat {
    Csv,
    Json,
    Xml,
    Yaml,
}

impl SnapshotFormat {
    pub const ALL: [SnapshotFormat; 4] = [
        SnapshotFormat::Csv,
        SnapshotFormat::Json,
        SnapshotFormat::Xml,
        SnapshotFormat::Yaml,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Json => "json",
            SnapshotFormat::Xml => "xml",
            SnapshotFormat::Yaml => "yaml",
        }
    }

    /// `<stem>.<extension>`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }

    pub fn exporter(&self) -> Box<dyn SnapshotExporter> {
        match self {
            SnapshotFormat::Csv => Box::new(CsvExporter),
            SnapshotFormat::Json => Box::new(JsonExporter::default()),
            SnapshotFormat::Xml => Box::new(XmlExporter),
            SnapshotFormat::Yaml => Box::new(YamlExporter),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SnapshotFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SnapshotFormat::Csv),
            "json" => Ok(SnapshotFormat::Json),
            "xml" => Ok(SnapshotFormat::Xml),
            "yaml" | "yml" => Ok(SnapshotFormat::Yaml),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}
