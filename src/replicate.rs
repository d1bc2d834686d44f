//! The `replicate` command: replay the topic into storage.

use crate::config::parse_duration;
use anyhow::Context;
use cdr_replication::{
    LogConsumer, LogProducer, ReplayPolicy, ReplicationSubscriber, SubscriberConfig,
    SubscriberStats, DEFAULT_GROUP_ID,
};
use cdr_store::CdrStore;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where the subscriber starts after joining the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReplayMode {
    /// Replay the whole topic on every assignment
    Earliest,
    /// Resume from the group's committed offsets
    Committed,
}

impl From<ReplayMode> for ReplayPolicy {
    fn from(mode: ReplayMode) -> Self {
        match mode {
            ReplayMode::Earliest => ReplayPolicy::FromEarliest,
            ReplayMode::Committed => ReplayPolicy::FromCommitted,
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ReplicateArgs {
    /// Consumer group ID
    #[arg(long, default_value = DEFAULT_GROUP_ID)]
    pub group_id: String,

    /// Failed saves of one message before it is dead-lettered
    #[arg(long, default_value = "5")]
    pub max_delivery_attempts: u32,

    /// Pause before a failed message is redelivered
    #[arg(long, default_value = "500ms", value_parser = parse_duration)]
    pub retry_backoff: Duration,

    /// Wait per poll of the topic
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// Stop after this long without messages (runs until interrupted when omitted)
    #[arg(long, value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Stop after this many messages were persisted or dead-lettered
    #[arg(long)]
    pub max_records: Option<u64>,

    /// Topic receiving messages that could not be persisted
    #[arg(long)]
    pub dead_letter_topic: Option<String>,

    /// Start position after partitions are assigned
    #[arg(long, value_enum, default_value = "earliest")]
    pub replay: ReplayMode,
}

impl ReplicateArgs {
    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            max_delivery_attempts: self.max_delivery_attempts,
            retry_backoff: self.retry_backoff,
            poll_interval: self.poll_interval,
            idle_timeout: self.idle_timeout,
            max_records: self.max_records,
        }
    }

    pub fn replay_policy(&self) -> ReplayPolicy {
        self.replay.into()
    }
}

/// Run the replay subscriber over `consumer` until it stops.
///
/// `dead_letter` is used only when a dead-letter topic is configured.
pub async fn run_replicate<C>(
    args: &ReplicateArgs,
    store: Arc<dyn CdrStore>,
    consumer: &mut C,
    dead_letter: Option<Arc<dyn LogProducer>>,
    cancel: CancellationToken,
) -> anyhow::Result<SubscriberStats>
where
    C: LogConsumer + ?Sized,
{
    let mut subscriber =
        ReplicationSubscriber::new(store, args.subscriber_config()).with_cancellation(cancel);
    if let (Some(producer), Some(topic)) = (dead_letter, &args.dead_letter_topic) {
        subscriber = subscriber.with_dead_letter(producer, topic.clone());
    }

    subscriber
        .run(consumer)
        .await
        .context("Replication subscriber failed")
}
