//! Writing one batch in several formats.

use crate::error::ExportError;
use crate::format::SnapshotFormat;
use cdr_core::Cdr;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// File stem of snapshot files unless a date is given.
pub const DEFAULT_SNAPSHOT_STEM: &str = "cdr";

/// Result of exporting one format.
#[derive(Debug)]
pub struct ExportOutcome {
    pub format: SnapshotFormat,
    pub path: PathBuf,
    pub result: Result<(), ExportError>,
}

/// Delete `dir` with its contents if present and create it empty.
pub async fn prepare_output_dir(dir: &Path) -> Result<(), ExportError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!("Removed previous output directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ExportError::io(dir, e)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ExportError::io(dir, e))
}

/// Export `records` to `<dir>/<stem>.<ext>` for every format, concurrently.
///
/// A failing format never stops the others; outcomes come back in the order
/// of `formats`. A repeated format is written once.
pub async fn export_all(
    dir: &Path,
    stem: &str,
    records: Arc<Vec<Cdr>>,
    formats: &[SnapshotFormat],
) -> Vec<ExportOutcome> {
    let mut seen = BTreeSet::new();
    let formats: Vec<SnapshotFormat> = formats
        .iter()
        .copied()
        .filter(|format| seen.insert(*format))
        .collect();

    let mut tasks = JoinSet::new();
    for (index, format) in formats.iter().copied().enumerate() {
        let path = dir.join(format.file_name(stem));
        let records = records.clone();
        tasks.spawn_blocking(move || {
            let result = format.exporter().write(&path, &records);
            (index, ExportOutcome {
                format,
                path,
                result,
            })
        });
    }

    let mut outcomes: Vec<(usize, ExportOutcome)> = Vec::with_capacity(formats.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("Export task did not complete: {e}"),
        }
    }

    // Formats whose task died never reported; report them as failed.
    for (index, format) in formats.iter().copied().enumerate() {
        if !outcomes.iter().any(|(i, _)| *i == index) {
            outcomes.push((
                index,
                ExportOutcome {
                    format,
                    path: dir.join(format.file_name(stem)),
                    result: Err(ExportError::Task(format!("{format} export task failed"))),
                },
            ));
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    for (_, outcome) in &outcomes {
        match &outcome.result {
            Ok(()) => info!(
                "Exported {} records as {} to {}",
                records.len(),
                outcome.format,
                outcome.path.display()
            ),
            Err(e) => warn!("Failed to export {}: {e}", outcome.format),
        }
    }
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_core::ServiceType;
    use tempfile::TempDir;

    fn batch() -> Arc<Vec<Cdr>> {
        Arc::new(vec![
            Cdr::new(
                "+201001",
                Some("+201002".to_string()),
                ServiceType::Call,
                3.0,
                "2024-03-01T08:00:00",
            ),
            Cdr::new("+201003", None, ServiceType::Data, 1024.0, "2024-03-01T09:00:00"),
        ])
    }

    #[tokio::test]
    async fn test_export_all_formats() {
        let dir = TempDir::new().unwrap();
        let outcomes = export_all(dir.path(), "cdr", batch(), &SnapshotFormat::ALL).await;

        let formats: Vec<SnapshotFormat> = outcomes.iter().map(|o| o.format).collect();
        assert_eq!(formats, SnapshotFormat::ALL.to_vec());
        for outcome in &outcomes {
            assert!(outcome.result.is_ok(), "{:?}", outcome.result);
            assert!(outcome.path.exists());
        }
        assert!(dir.path().join("cdr.yaml").exists());
    }

    #[tokio::test]
    async fn test_repeated_format_is_written_once() {
        let dir = TempDir::new().unwrap();
        let outcomes = export_all(
            dir.path(),
            "cdr",
            batch(),
            &[SnapshotFormat::Csv, SnapshotFormat::Yaml, SnapshotFormat::Csv],
        )
        .await;

        let formats: Vec<SnapshotFormat> = outcomes.iter().map(|o| o.format).collect();
        assert_eq!(formats, vec![SnapshotFormat::Csv, SnapshotFormat::Yaml]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        let csv = std::fs::read_to_string(dir.path().join("cdr.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_failing_format_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        // a directory where the JSON file should go makes that export fail
        std::fs::create_dir(dir.path().join("cdr.json")).unwrap();

        let outcomes = export_all(dir.path(), "cdr", batch(), &SnapshotFormat::ALL).await;

        let failed: Vec<SnapshotFormat> = outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.format)
            .collect();
        assert_eq!(failed, vec![SnapshotFormat::Json]);
        assert!(dir.path().join("cdr.csv").is_file());
        assert!(dir.path().join("cdr.xml").is_file());
    }

    #[tokio::test]
    async fn test_prepare_output_dir_clears_previous_snapshots() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("cdr_output");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("old.csv"), "stale").unwrap();

        prepare_output_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_output_dir_creates_missing_dir() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("nested").join("out");
        prepare_output_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_export_is_byte_identical_across_runs() {
        let dir = TempDir::new().unwrap();
        let records = batch();

        export_all(dir.path(), "first", records.clone(), &SnapshotFormat::ALL).await;
        export_all(dir.path(), "second", records, &SnapshotFormat::ALL).await;

        for format in SnapshotFormat::ALL {
            let first = std::fs::read(dir.path().join(format.file_name("first"))).unwrap();
            let second = std::fs::read(dir.path().join(format.file_name("second"))).unwrap();
            assert_eq!(first, second, "{format} output differs");
        }
    }
}
