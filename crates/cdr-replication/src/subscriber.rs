//! Replay-side persistence of replicated records.

use crate::broker::{Delivery, LogConsumer, LogProducer};
use crate::codec::decode_record;
use crate::error::ReplicationError;
use cdr_core::Cdr;
use cdr_store::CdrStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Failed saves of one message before it is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Pause before a failed message is redelivered.
    pub retry_backoff: Duration,
    pub poll_interval: Duration,
    /// Stop after this long without a message. `None` runs until cancelled.
    pub idle_timeout: Option<Duration>,
    /// Stop after this many messages were resolved (persisted or dead-lettered).
    pub max_records: Option<u64>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 5,
            retry_backoff: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            idle_timeout: None,
            max_records: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    pub received: u64,
    pub persisted: u64,
    /// Redeliveries requested after a failed save.
    pub retried: u64,
    pub dead_lettered: u64,
    pub decode_failures: u64,
    pub consume_errors: u64,
}

impl SubscriberStats {
    fn resolved(&self) -> u64 {
        self.persisted + self.dead_lettered
    }
}

type MessageKey = (String, i32, i64);

/// Persists every record delivered on the replication topic as a new row.
///
/// A save failure leaves the message unacknowledged and rewinds to it, so
/// the broker hands it out again. After `max_delivery_attempts` failures,
/// or straight away for payloads that cannot be decoded or validated, the
/// message is logged, copied to the dead-letter topic when one is set and
/// acknowledged so the partition keeps moving.
pub struct ReplicationSubscriber {
    store: Arc<dyn CdrStore>,
    config: SubscriberConfig,
    dead_letter: Option<(Arc<dyn LogProducer>, String)>,
    cancel: CancellationToken,
}

impl ReplicationSubscriber {
    pub fn new(store: Arc<dyn CdrStore>, config: SubscriberConfig) -> Self {
        Self {
            store,
            config,
            dead_letter: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_dead_letter(mut self, producer: Arc<dyn LogProducer>, topic: impl Into<String>) -> Self {
        self.dead_letter = Some((producer, topic.into()));
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Consume until cancelled, idle for `idle_timeout`, or `max_records` resolved.
    pub async fn run<C>(&self, consumer: &mut C) -> Result<SubscriberStats, ReplicationError>
    where
        C: LogConsumer + ?Sized,
    {
        if self.config.max_delivery_attempts == 0 {
            return Err(ReplicationError::InvalidConfig(
                "max_delivery_attempts must be at least 1".to_string(),
            ));
        }

        let mut stats = SubscriberStats::default();
        let mut attempts: HashMap<MessageKey, u32> = HashMap::new();
        let mut last_activity = Instant::now();

        loop {
            if let Some(max) = self.config.max_records {
                if stats.resolved() >= max {
                    info!("Resolved {max} records, stopping subscriber");
                    break;
                }
            }

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Subscriber cancelled");
                    break;
                }
                polled = consumer.next_delivery(self.config.poll_interval) => polled,
            };

            let delivery = match polled {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    if let Some(idle) = self.config.idle_timeout {
                        if last_activity.elapsed() >= idle {
                            info!("No messages for {idle:?}, stopping subscriber");
                            break;
                        }
                    }
                    continue;
                }
                Err(e) => {
                    warn!("Failed to receive message: {e}");
                    stats.consume_errors += 1;
                    if let Some(idle) = self.config.idle_timeout {
                        if last_activity.elapsed() >= idle {
                            break;
                        }
                    }
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
            };

            last_activity = Instant::now();
            stats.received += 1;
            self.handle(consumer, delivery, &mut attempts, &mut stats)
                .await;
        }

        info!(
            "Subscriber finished: {} received, {} persisted, {} retried, {} dead-lettered",
            stats.received, stats.persisted, stats.retried, stats.dead_lettered
        );
        Ok(stats)
    }

    async fn handle<C>(
        &self,
        consumer: &mut C,
        delivery: Delivery,
        attempts: &mut HashMap<MessageKey, u32>,
        stats: &mut SubscriberStats,
    ) where
        C: LogConsumer + ?Sized,
    {
        let record = match decode_record(&delivery.payload) {
            Ok(record) => record,
            Err(source) => {
                let err = ReplicationError::Decode {
                    topic: delivery.topic.clone(),
                    partition: delivery.partition,
                    offset: delivery.offset,
                    source,
                };
                error!("Skipping undecodable message: {err}");
                stats.decode_failures += 1;
                self.give_up(consumer, &delivery, stats).await;
                return;
            }
        };

        if let Err(e) = record.validate() {
            error!(
                "Skipping invalid record at {}/{}@{}: {e}",
                delivery.topic, delivery.partition, delivery.offset
            );
            self.give_up(consumer, &delivery, stats).await;
            return;
        }

        let key = (delivery.topic.clone(), delivery.partition, delivery.offset);
        let wire_id = record.id;
        let fresh = record.without_id();
        match self.store.save(fresh.clone()).await {
            Ok(saved) => {
                attempts.remove(&key);
                stats.persisted += 1;
                debug!(
                    "Replayed {}/{}@{} (wire id {wire_id:?}) as id {:?}",
                    delivery.topic, delivery.partition, delivery.offset, saved.id
                );
                self.acknowledge(consumer, &delivery).await;
            }
            Err(e) => {
                let attempt = {
                    let count = attempts.entry(key.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                if attempt >= self.config.max_delivery_attempts {
                    error!(
                        "Giving up on {}/{}@{} after {} attempts: {e}",
                        delivery.topic, delivery.partition, delivery.offset, attempt
                    );
                    attempts.remove(&key);
                    self.give_up(consumer, &delivery, stats).await;
                } else {
                    warn!(
                        "Failed to persist {}/{}@{} (attempt {}/{}): {e}",
                        delivery.topic,
                        delivery.partition,
                        delivery.offset,
                        attempt,
                        self.config.max_delivery_attempts
                    );
                    stats.retried += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                    if let Err(e) = consumer.redeliver(&delivery).await {
                        warn!("Failed to rewind for redelivery, retrying in place: {e}");
                        attempts.remove(&key);
                        self.retry_in_place(consumer, &delivery, fresh, attempt, stats)
                            .await;
                    }
                }
            }
        }
    }

    /// Keep saving `record` without the broker's help until it is persisted
    /// or the attempt budget is spent. The offset is only committed after one
    /// of the two.
    async fn retry_in_place<C>(
        &self,
        consumer: &mut C,
        delivery: &Delivery,
        record: Cdr,
        mut attempt: u32,
        stats: &mut SubscriberStats,
    ) where
        C: LogConsumer + ?Sized,
    {
        loop {
            attempt += 1;
            match self.store.save(record.clone()).await {
                Ok(saved) => {
                    stats.persisted += 1;
                    debug!(
                        "Persisted {}/{}@{} as id {:?} after {attempt} attempts",
                        delivery.topic, delivery.partition, delivery.offset, saved.id
                    );
                    self.acknowledge(consumer, delivery).await;
                    return;
                }
                Err(e) if attempt >= self.config.max_delivery_attempts => {
                    error!(
                        "Giving up on {}/{}@{} after {attempt} attempts: {e}",
                        delivery.topic, delivery.partition, delivery.offset
                    );
                    self.give_up(consumer, delivery, stats).await;
                    return;
                }
                Err(e) => {
                    warn!(
                        "Failed to persist {}/{}@{} (attempt {attempt}/{}): {e}",
                        delivery.topic,
                        delivery.partition,
                        delivery.offset,
                        self.config.max_delivery_attempts
                    );
                    stats.retried += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }
    }

    async fn give_up<C>(&self, consumer: &mut C, delivery: &Delivery, stats: &mut SubscriberStats)
    where
        C: LogConsumer + ?Sized,
    {
        if let Some((producer, topic)) = &self.dead_letter {
            match producer
                .send(topic, delivery.key.as_deref(), &delivery.payload)
                .await
            {
                Ok(()) => info!(
                    "Dead-lettered {}/{}@{} to '{topic}'",
                    delivery.topic, delivery.partition, delivery.offset
                ),
                Err(e) => error!("Failed to dead-letter message: {e}"),
            }
        }
        stats.dead_lettered += 1;
        self.acknowledge(consumer, delivery).await;
    }

    async fn acknowledge<C>(&self, consumer: &mut C, delivery: &Delivery)
    where
        C: LogConsumer + ?Sized,
    {
        if let Err(e) = consumer.acknowledge(delivery).await {
            warn!(
                "Failed to commit offset {} on {}/{}: {e}",
                delivery.offset + 1,
                delivery.topic,
                delivery.partition
            );
        }
    }
}
