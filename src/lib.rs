//! cdr-sync library
//!
//! Generates synthetic call detail records (CDRs), stores them, writes
//! snapshot files and replicates them through Kafka.
//!
//! ```text
//!                 ┌──────────────────────── generate ───────────────────────┐
//!  RecordFactory ─┼─▶ GenerationQueue ─▶ collector ─▶ batch ─┬─▶ BatchPersistor ─▶ CdrStore
//!                 │   (PipelineOrchestrator, worker pool)    ├─▶ snapshot files (csv/json/xml/yaml)
//!                 │                                          └─▶ ReplicationPublisher ─▶ Kafka topic
//!                 └──────────────────────────────────────────────────────────┘
//!
//!                 ┌──────────────────────── replicate ──────────────────────┐
//!  Kafka topic ───┼─▶ ReplicationSubscriber (rewind to earliest on assign) ─▶ CdrStore
//!                 └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every collaborator is built once at startup and passed in: the command
//! functions here take stores, producers and consumers as arguments, so the
//! same flows run against SurrealDB and Kafka in production and against
//! in-memory implementations in tests.
//!
//! # CLI Usage
//!
//! ```bash
//! # Generate 150 records, persist them, export snapshots and publish them
//! cdr-sync generate --count 150 --brokers localhost:9092
//!
//! # Replay the whole topic into storage, stopping after 10s without messages
//! cdr-sync replicate --group-id backend-group --idle-timeout 10s
//!
//! # Revenue and volume report for one day
//! cdr-sync report --date 2024-03-01
//! ```

use cdr_replication::{KafkaConfig, DEFAULT_TOPIC};
use cdr_store::SurrealOpts;
use clap::Parser;
use std::time::Duration;

pub mod config;
pub mod generate;
pub mod replicate;
pub mod report;
pub mod store;

pub use generate::{run_generate, GenerateArgs, GenerateContext, GenerateSummary};
pub use replicate::{run_replicate, ReplayMode, ReplicateArgs};
pub use report::{render_report, run_report, ReportArgs};
pub use store::open_store;

/// Kafka connection options
#[derive(Parser, Clone, Debug)]
pub struct KafkaOpts {
    /// Kafka brokers (comma-separated list)
    #[arg(long, default_value = "localhost:9092", env = "KAFKA_BROKERS")]
    pub brokers: String,

    /// Replication topic
    #[arg(long, default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Partitions used when the topic has to be created
    #[arg(long, default_value = "1")]
    pub partitions: i32,

    /// Produce timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub message_timeout_ms: u64,

    /// Consumer session timeout in milliseconds
    #[arg(long, default_value = "6000")]
    pub session_timeout_ms: u64,
}

impl From<&KafkaOpts> for KafkaConfig {
    fn from(opts: &KafkaOpts) -> Self {
        Self {
            brokers: opts.brokers.clone(),
            message_timeout: Duration::from_millis(opts.message_timeout_ms),
            session_timeout: Duration::from_millis(opts.session_timeout_ms),
        }
    }
}

/// CDR storage options
#[derive(Parser, Clone, Debug)]
pub struct StoreOpts {
    /// SurrealDB endpoint URL (`mem://` runs an embedded in-memory database)
    #[arg(long, default_value = "mem://", env = "SURREAL_ENDPOINT")]
    pub surreal_endpoint: String,

    /// SurrealDB username
    #[arg(long, default_value = "root", env = "SURREAL_USERNAME")]
    pub surreal_username: String,

    /// SurrealDB password
    #[arg(long, default_value = "root", env = "SURREAL_PASSWORD")]
    pub surreal_password: String,

    /// SurrealDB namespace
    #[arg(long, default_value = "cdr")]
    pub namespace: String,

    /// SurrealDB database
    #[arg(long, default_value = "cdr")]
    pub database: String,

    /// Table holding the records
    #[arg(long, default_value = "cdrs")]
    pub table: String,

    /// Records per committed transaction when persisting a batch
    #[arg(long, default_value = "100")]
    pub chunk_size: usize,
}

impl From<&StoreOpts> for SurrealOpts {
    fn from(opts: &StoreOpts) -> Self {
        Self {
            endpoint: opts.surreal_endpoint.clone(),
            username: opts.surreal_username.clone(),
            password: opts.surreal_password.clone(),
            namespace: opts.namespace.clone(),
            database: opts.database.clone(),
        }
    }
}
