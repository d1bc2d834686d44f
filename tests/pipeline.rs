//! End-to-end flows of the generate, replicate and report commands over
//! the in-memory store and broker.

use cdr_core::ServiceType;
use cdr_replication::{MemoryBroker, ReplayPolicy, ReplicationPublisher, DEFAULT_TOPIC};
use cdr_store::{CdrStore, MemoryStore};
use cdr_sync::{
    run_generate, run_replicate, run_report, GenerateArgs, GenerateContext, ReplicateArgs,
    ReportArgs,
};
use clap::Parser;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn generate_args(dir: &TempDir, extra: &[&str]) -> GenerateArgs {
    let output_dir = dir.path().join("out");
    let mut argv = vec![
        "generate".to_string(),
        "--output-dir".to_string(),
        output_dir.display().to_string(),
        "--seed".to_string(),
        "42".to_string(),
    ];
    argv.extend(extra.iter().map(|arg| arg.to_string()));
    GenerateArgs::try_parse_from(argv).unwrap()
}

fn context(store: Option<Arc<MemoryStore>>, broker: Option<&MemoryBroker>) -> GenerateContext {
    GenerateContext {
        store: store.map(|store| store as Arc<dyn CdrStore>),
        chunk_size: 100,
        publisher: broker
            .map(|broker| ReplicationPublisher::new(Arc::new(broker.producer()), DEFAULT_TOPIC)),
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn test_generate_persists_exports_and_publishes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let broker = MemoryBroker::default();
    let args = generate_args(&dir, &["--count", "250", "--date", "2024-03-01"]);

    let summary = run_generate(&args, context(Some(store.clone()), Some(&broker)))
        .await
        .unwrap();
    summary.ensure_success().unwrap();

    assert_eq!(summary.requested, 250);
    assert_eq!(store.chunk_commits(), vec![100, 100, 50]);
    assert_eq!(store.flushes(), 3);
    assert_eq!(store.len(), 250);

    let ids: Vec<i64> = summary.records.iter().filter_map(|r| r.id).collect();
    assert_eq!(ids, (1..=250).collect::<Vec<i64>>());
    assert!(summary
        .records
        .iter()
        .all(|r| r.start_date_time.starts_with("2024-03-01")));

    for name in [
        "2024-03-01.csv",
        "2024-03-01.json",
        "2024-03-01.xml",
        "2024-03-01.yaml",
    ] {
        assert!(args.output_dir.join(name).is_file(), "missing {name}");
    }
    assert_eq!(summary.exports.len(), 4);

    assert_eq!(broker.message_count(DEFAULT_TOPIC), 250);
    let published = summary.published.as_ref().unwrap();
    assert_eq!(published.sent, 250);
    assert_eq!(published.failed, 0);
}

#[tokio::test]
async fn test_every_format_writes_null_bnum() {
    let dir = TempDir::new().unwrap();
    let args = generate_args(&dir, &["--count", "120", "--skip-persist", "--skip-publish"]);

    let summary = run_generate(&args, context(None, None)).await.unwrap();
    assert!(summary.persisted.is_none());
    assert!(summary.published.is_none());

    let data_records = summary
        .records
        .iter()
        .filter(|r| r.service_type == ServiceType::Data)
        .count();
    assert!(summary
        .records
        .iter()
        .all(|r| r.bnum.is_none() == (r.service_type == ServiceType::Data)));

    let read = |name: &str| std::fs::read_to_string(args.output_dir.join(name)).unwrap();

    let json: serde_json::Value = serde_json::from_str(&read("cdr.json")).unwrap();
    let null_bnums = json
        .as_array()
        .unwrap()
        .iter()
        .filter(|object| object["bnum"].is_null())
        .count();
    assert_eq!(null_bnums, data_records);

    let csv = read("cdr.csv");
    let csv_nulls = csv
        .lines()
        .skip(1)
        .filter(|line| line.split(',').nth(2) == Some("null"))
        .count();
    assert_eq!(csv_nulls, data_records);

    assert_eq!(read("cdr.xml").matches("<bnum nil=\"true\"/>").count(), data_records);
    assert_eq!(read("cdr.yaml").matches("bnum: null").count(), data_records);
}

#[tokio::test]
async fn test_cancelled_generation_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let broker = MemoryBroker::default();
    let args = generate_args(&dir, &["--count", "50"]);

    let mut ctx = context(Some(store.clone()), Some(&broker));
    ctx.cancel.cancel();
    let err = run_generate(&args, ctx).await.unwrap_err();

    assert!(err.to_string().contains("Generation failed"));
    assert!(store.is_empty());
    assert_eq!(broker.message_count(DEFAULT_TOPIC), 0);
    assert!(!args.output_dir.exists());
}

#[tokio::test]
async fn test_each_join_replays_the_whole_topic() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemoryStore::new());
    let broker = MemoryBroker::default();
    let args = generate_args(&dir, &["--count", "3", "--formats", "json"]);
    run_generate(&args, context(Some(source.clone()), Some(&broker)))
        .await
        .unwrap()
        .ensure_success()
        .unwrap();

    let replica = Arc::new(MemoryStore::new());
    replica
        .save(source.rows()[0].clone().without_id())
        .await
        .unwrap();

    let replicate = ReplicateArgs::try_parse_from([
        "replicate",
        "--max-records",
        "3",
        "--poll-interval",
        "20ms",
        "--retry-backoff",
        "10ms",
    ])
    .unwrap();

    for _ in 0..2 {
        let mut consumer =
            broker.consumer(DEFAULT_TOPIC, &replicate.group_id, replicate.replay_policy());
        let stats = run_replicate(
            &replicate,
            replica.clone(),
            &mut consumer,
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.persisted, 3);
        assert_eq!(stats.dead_lettered, 0);
    }

    assert_eq!(broker.joins(), 2);
    let ids: Vec<Option<i64>> = replica.rows().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=7).map(Some).collect::<Vec<_>>());

    let anums: Vec<String> = replica.rows()[1..].iter().map(|r| r.anum.clone()).collect();
    let expected: Vec<String> = source.rows().iter().map(|r| r.anum.clone()).collect();
    assert_eq!(anums[..3], expected[..]);
    assert_eq!(anums[3..], expected[..]);
}

#[tokio::test]
async fn test_rejoin_after_partial_consume_replays_everything() {
    let broker = MemoryBroker::default();
    let records: Vec<_> = (0..5)
        .map(|i| {
            cdr_core::Cdr::new(
                format!("+2010000000{i}"),
                Some("+201119999999".to_string()),
                ServiceType::Call,
                3.0,
                "2024-03-01T10:00:00",
            )
            .with_id(100 + i)
        })
        .collect();
    ReplicationPublisher::new(Arc::new(broker.producer()), DEFAULT_TOPIC)
        .publish_all(&records)
        .await;
    let expected: Vec<String> = records.iter().map(|r| r.anum.clone()).collect();
    let store = Arc::new(MemoryStore::new());

    let partial = ReplicateArgs::try_parse_from([
        "replicate",
        "--max-records",
        "2",
        "--poll-interval",
        "20ms",
    ])
    .unwrap();
    assert_eq!(partial.replay_policy(), ReplayPolicy::FromEarliest);
    let mut consumer = broker.consumer(DEFAULT_TOPIC, &partial.group_id, partial.replay_policy());
    let first = run_replicate(&partial, store.clone(), &mut consumer, None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.persisted, 2);
    assert_eq!(broker.committed_offset(&partial.group_id, DEFAULT_TOPIC, 0), Some(2));

    let full = ReplicateArgs::try_parse_from([
        "replicate",
        "--max-records",
        "5",
        "--poll-interval",
        "20ms",
    ])
    .unwrap();
    let mut consumer = broker.consumer(DEFAULT_TOPIC, &full.group_id, full.replay_policy());
    let second = run_replicate(&full, store.clone(), &mut consumer, None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.persisted, 5);

    let rows = store.rows();
    assert_eq!(rows.len(), 2 + 5);
    let first_session: Vec<String> = rows[..2].iter().map(|r| r.anum.clone()).collect();
    let second_session: Vec<String> = rows[2..].iter().map(|r| r.anum.clone()).collect();
    assert_eq!(first_session, expected[..2]);
    assert_eq!(second_session, expected);
    assert!(rows.iter().all(|r| r.id.is_some_and(|id| id <= 7)));
}

#[tokio::test]
async fn test_committed_replay_resumes_after_last_ack() {
    let broker = MemoryBroker::default();
    let records: Vec<_> = (0..4)
        .map(|i| {
            cdr_core::Cdr::new(
                format!("+2010000000{i}"),
                None,
                ServiceType::Data,
                1024.0,
                "2024-03-01T10:00:00",
            )
        })
        .collect();
    ReplicationPublisher::new(Arc::new(broker.producer()), DEFAULT_TOPIC)
        .publish_all(&records)
        .await;

    let store = Arc::new(MemoryStore::new());
    let replicate = ReplicateArgs::try_parse_from([
        "replicate",
        "--replay",
        "committed",
        "--max-records",
        "2",
        "--poll-interval",
        "20ms",
    ])
    .unwrap();
    assert_eq!(replicate.replay_policy(), ReplayPolicy::FromCommitted);

    for _ in 0..2 {
        let mut consumer =
            broker.consumer(DEFAULT_TOPIC, &replicate.group_id, replicate.replay_policy());
        run_replicate(&replicate, store.clone(), &mut consumer, None, CancellationToken::new())
            .await
            .unwrap();
    }

    let anums: Vec<String> = store.rows().iter().map(|r| r.anum.clone()).collect();
    let expected: Vec<String> = records.iter().map(|r| r.anum.clone()).collect();
    assert_eq!(anums, expected);
}

#[tokio::test]
async fn test_report_over_generated_batch() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let args = generate_args(
        &dir,
        &["--count", "150", "--date", "2024-03-01", "--skip-publish"],
    );
    run_generate(&args, context(Some(store.clone()), None))
        .await
        .unwrap();

    let report_args = ReportArgs::try_parse_from([
        "report",
        "--date",
        "2024-03-01",
        "--most-frequent",
        "--limit",
        "5",
    ])
    .unwrap();
    let report = run_report(&report_args, store.as_ref()).await.unwrap();

    assert!(report.contains("Records: 150"));
    assert!(report.contains("Revenue for 2024-03-01 (150 records):"));
    assert!(report.contains("Listing (5 records):"));
}
