//! The `generate` command: produce a batch and fan it out.

use crate::config::{parse_date, parse_duration};
use anyhow::Context;
use cdr_core::Cdr;
use cdr_export::{export_all, prepare_output_dir, ExportOutcome, SnapshotFormat, DEFAULT_SNAPSHOT_STEM};
use cdr_generator::RecordFactory;
use cdr_replication::{PublishReport, ReplicationPublisher};
use cdr_store::{BatchPersistor, BatchReport, CdrStore, PersistenceError};
use chrono::NaiveDate;
use clap::Parser;
use generation_pipeline::{GenerationRun, OrchestratorConfig, PipelineOrchestrator};
use rand::Rng;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Batch size drawn when no count is given.
pub const DEFAULT_COUNT_RANGE: Range<usize> = 100..200;

#[derive(Parser, Clone, Debug)]
pub struct GenerateArgs {
    /// Number of records to generate (random between 100 and 199 when omitted)
    #[arg(long)]
    pub count: Option<usize>,

    /// Pin every record to this day (YYYY-MM-DD); snapshots are named after it
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Snapshot directory, recreated on every run
    #[arg(long, default_value = "cdr_output")]
    pub output_dir: PathBuf,

    /// Snapshot formats to write
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = SnapshotFormat::ALL)]
    pub formats: Vec<SnapshotFormat>,

    /// Seed for reproducible batches
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker pool size
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// How long the collector waits for each record
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub poll_timeout: Duration,

    /// How long shutdown waits for running tasks before cancelling them
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    pub grace_period: Duration,

    /// Do not write the batch to storage
    #[arg(long)]
    pub skip_persist: bool,

    /// Do not publish the batch to the replication topic
    #[arg(long)]
    pub skip_publish: bool,
}

impl GenerateArgs {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            workers: self.workers,
            poll_timeout: self.poll_timeout,
            grace_period: self.grace_period,
        }
    }

    fn snapshot_stem(&self) -> String {
        self.date
            .map_or_else(|| DEFAULT_SNAPSHOT_STEM.to_string(), |day| day.to_string())
    }
}

/// Collaborators of a generation run.
pub struct GenerateContext {
    pub store: Option<Arc<dyn CdrStore>>,
    pub chunk_size: usize,
    pub publisher: Option<ReplicationPublisher>,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct GenerateSummary {
    pub requested: usize,
    /// The batch as exported and published; carries ids when persisted.
    pub records: Vec<Cdr>,
    pub persisted: Option<Result<BatchReport, PersistenceError>>,
    pub exports: Vec<ExportOutcome>,
    pub published: Option<PublishReport>,
}

impl GenerateSummary {
    pub fn failed_exports(&self) -> Vec<SnapshotFormat> {
        self.exports
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.format)
            .collect()
    }

    /// Fail unless every requested step fully succeeded.
    pub fn ensure_success(&self) -> anyhow::Result<()> {
        if let Some(Err(e)) = &self.persisted {
            anyhow::bail!("Persisting the batch failed: {e}");
        }
        let failed = self.failed_exports();
        if !failed.is_empty() {
            let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
            anyhow::bail!("Snapshot export failed for: {}", names.join(", "));
        }
        if let Some(report) = &self.published {
            if report.failed > 0 {
                anyhow::bail!(
                    "{} of {} records could not be published",
                    report.failed,
                    report.failed + report.sent
                );
            }
        }
        Ok(())
    }
}

/// Generate a batch, then persist, export and publish it.
///
/// An incomplete generation run aborts before anything is written.
pub async fn run_generate(
    args: &GenerateArgs,
    ctx: GenerateContext,
) -> anyhow::Result<GenerateSummary> {
    let (requested, seed) = {
        let mut rng = rand::thread_rng();
        let requested = args
            .count
            .unwrap_or_else(|| rng.gen_range(DEFAULT_COUNT_RANGE));
        (requested, args.seed.unwrap_or_else(|| rng.gen()))
    };

    let factory = RecordFactory::new(seed).with_target_date(args.date);
    let orchestrator = PipelineOrchestrator::new(args.orchestrator_config())
        .with_cancellation(ctx.cancel.clone());
    let run: GenerationRun = orchestrator.run(factory, requested).await;
    if !run.is_complete() {
        let collected = run.records.len();
        let failure = run
            .failure
            .map_or_else(|| "incomplete batch".to_string(), |e| e.to_string());
        anyhow::bail!("Generation failed: collected {collected} of {requested} records: {failure}");
    }
    let mut records = run.records;
    info!("Generated {} records (seed {seed})", records.len());

    let persisted = match &ctx.store {
        Some(store) if !args.skip_persist => {
            let persistor = BatchPersistor::new(store.clone()).with_chunk_size(ctx.chunk_size);
            let outcome = persistor.save_all(&records).await;
            match &outcome {
                Ok(report) => records = report.records.clone(),
                Err(e) => warn!("{e}; {} records remain committed", e.committed()),
            }
            Some(outcome)
        }
        _ => None,
    };

    prepare_output_dir(&args.output_dir)
        .await
        .with_context(|| format!("Failed to prepare {}", args.output_dir.display()))?;
    let shared = Arc::new(records);
    let exports = export_all(
        &args.output_dir,
        &args.snapshot_stem(),
        shared.clone(),
        &args.formats,
    )
    .await;
    let records = Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.as_ref().clone());

    let published = match &ctx.publisher {
        Some(publisher) if !args.skip_publish => Some(publisher.publish_all(&records).await),
        _ => None,
    };

    Ok(GenerateSummary {
        requested,
        records,
        persisted,
        exports,
        published,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = GenerateArgs::try_parse_from(["generate"]).unwrap();
        assert_eq!(args.count, None);
        assert_eq!(args.output_dir, PathBuf::from("cdr_output"));
        assert_eq!(args.formats, SnapshotFormat::ALL.to_vec());
        assert_eq!(args.workers, 4);
        assert_eq!(args.poll_timeout, Duration::from_secs(5));
        assert_eq!(args.grace_period, Duration::from_secs(30));
        assert_eq!(args.snapshot_stem(), "cdr");
    }

    #[test]
    fn test_date_names_snapshots() {
        let args = GenerateArgs::try_parse_from([
            "generate",
            "--date",
            "2024-03-01",
            "--formats",
            "csv,yaml",
            "--poll-timeout",
            "250ms",
        ])
        .unwrap();
        assert_eq!(args.snapshot_stem(), "2024-03-01");
        assert_eq!(args.formats, vec![SnapshotFormat::Csv, SnapshotFormat::Yaml]);
        assert_eq!(args.poll_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(GenerateArgs::try_parse_from(["generate", "--date", "March 1st"]).is_err());
    }
}
