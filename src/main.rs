//! Command-line interface for cdr-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Generate a random-sized batch (100..200 records) for today
//! cdr-sync generate
//!
//! # Generate 500 records dated 2024-03-01, only CSV and JSON snapshots
//! cdr-sync generate --count 500 --date 2024-03-01 --formats csv,json
//!
//! # Replay the topic into a remote SurrealDB
//! cdr-sync replicate \
//!   --surreal-endpoint ws://localhost:8000 \
//!   --brokers localhost:9092 \
//!   --dead-letter-topic cdr-topic-dlq
//!
//! # Report on stored records
//! cdr-sync report --date 2024-03-01 --most-frequent --sort usage --limit 20
//! ```

use anyhow::Context;
use cdr_replication::{
    KafkaConfig, KafkaLogConsumer, KafkaLogProducer, LogProducer, ReplicationPublisher,
};
use cdr_sync::{
    open_store, run_generate, run_replicate, run_report, GenerateArgs, GenerateContext,
    KafkaOpts, ReplicateArgs, ReportArgs, StoreOpts,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cdr-sync")]
#[command(about = "Generate, store, export and replicate call detail records")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a batch of records, persist it, export snapshots and publish it
    Generate {
        #[command(flatten)]
        args: GenerateArgs,

        /// Kafka options
        #[command(flatten)]
        kafka: KafkaOpts,

        /// Storage options
        #[command(flatten)]
        store: StoreOpts,
    },

    /// Consume the replication topic and persist every record
    Replicate {
        #[command(flatten)]
        args: ReplicateArgs,

        /// Kafka options
        #[command(flatten)]
        kafka: KafkaOpts,

        /// Storage options
        #[command(flatten)]
        store: StoreOpts,
    },

    /// Print volume, revenue and listings of stored records
    Report {
        #[command(flatten)]
        args: ReportArgs,

        /// Storage options
        #[command(flatten)]
        store: StoreOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { args, kafka, store } => {
            let cancel = shutdown_on_ctrl_c();
            let cdr_store = if args.skip_persist {
                None
            } else {
                Some(open_store(&store).await?)
            };
            let publisher = if args.skip_publish {
                None
            } else {
                let producer = KafkaLogProducer::new(KafkaConfig::from(&kafka))
                    .context("Failed to create Kafka producer")?;
                producer
                    .ensure_topic(&kafka.topic, kafka.partitions)
                    .await
                    .with_context(|| format!("Failed to create topic '{}'", kafka.topic))?;
                let producer: Arc<dyn LogProducer> = Arc::new(producer);
                Some(ReplicationPublisher::new(producer, kafka.topic.clone()))
            };

            let summary = run_generate(
                &args,
                GenerateContext {
                    store: cdr_store,
                    chunk_size: store.chunk_size,
                    publisher,
                    cancel,
                },
            )
            .await?;

            for outcome in &summary.exports {
                match &outcome.result {
                    Ok(()) => info!("Wrote {}", outcome.path.display()),
                    Err(e) => warn!("Failed to write {}: {e}", outcome.path.display()),
                }
            }
            if let Some(report) = &summary.published {
                info!("Published {} records ({} failed)", report.sent, report.failed);
            }
            summary.ensure_success()?;
            info!("Generation of {} records completed", summary.requested);
        }
        Commands::Replicate { args, kafka, store } => {
            let cancel = shutdown_on_ctrl_c();
            let cdr_store = open_store(&store).await?;
            let config = KafkaConfig::from(&kafka);

            let dead_letter: Option<Arc<dyn LogProducer>> = match &args.dead_letter_topic {
                Some(topic) => {
                    let producer = KafkaLogProducer::new(config.clone())
                        .context("Failed to create dead-letter producer")?;
                    producer.ensure_topic(topic, 1).await?;
                    Some(Arc::new(producer))
                }
                None => None,
            };
            let mut consumer = KafkaLogConsumer::new(
                &config,
                &kafka.topic,
                &args.group_id,
                args.replay_policy(),
            )
            .context("Failed to create Kafka consumer")?;

            let stats = run_replicate(&args, cdr_store, &mut consumer, dead_letter, cancel).await?;
            info!(
                "Replication stopped: {} received, {} persisted, {} retried, {} dead-lettered",
                stats.received, stats.persisted, stats.retried, stats.dead_lettered
            );
        }
        Commands::Report { args, store } => {
            let cdr_store = open_store(&store).await?;
            let report = run_report(&args, cdr_store.as_ref()).await?;
            print!("{report}");
        }
    }

    Ok(())
}

/// Token cancelled on the first Ctrl+C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt signal (Ctrl+C), shutting down");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {e}"),
        }
    });
    token
}
