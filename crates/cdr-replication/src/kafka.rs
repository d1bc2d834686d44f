//! rdkafka implementations of the broker seams.

use crate::broker::{Delivery, LogConsumer, LogProducer, ReplayPolicy};
use crate::error::ReplicationError;
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer,
};
use rdkafka::error::KafkaResult;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Kafka connection settings
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Upper bound for a produce request to be acknowledged
    pub message_timeout: Duration,
    pub session_timeout: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            message_timeout: Duration::from_millis(5000),
            session_timeout: Duration::from_millis(6000),
        }
    }
}

/// Producer over an rdkafka [`FutureProducer`].
pub struct KafkaLogProducer {
    producer: FutureProducer,
    config: KafkaConfig,
}

impl KafkaLogProducer {
    pub fn new(config: KafkaConfig) -> Result<Self, ReplicationError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()?;
        Ok(Self { producer, config })
    }

    /// Create `topic` unless it already exists.
    pub async fn ensure_topic(&self, topic: &str, partitions: i32) -> Result<(), ReplicationError> {
        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .create()?;

        let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(1));
        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(5)));

        for result in admin_client.create_topics(&[new_topic], &opts).await? {
            match result {
                Ok(topic_name) => info!("Topic '{topic_name}' created"),
                Err((topic_name, err)) => {
                    if err.to_string().contains("already exists") {
                        debug!("Topic '{topic_name}' already exists");
                    } else {
                        return Err(ReplicationError::Delivery {
                            topic: topic_name,
                            message: format!("failed to create topic: {err}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LogProducer for KafkaLogProducer {
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<(), ReplicationError> {
        let mut record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        match self.producer.send(record, self.config.message_timeout).await {
            Ok(_) => Ok(()),
            Err((err, _)) => Err(ReplicationError::Delivery {
                topic: topic.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Consumer context that applies the [`ReplayPolicy`] on every assignment.
pub struct ReplayContext {
    policy: ReplayPolicy,
}

impl ReplayContext {
    pub fn new(policy: ReplayPolicy) -> Self {
        Self { policy }
    }
}

impl ClientContext for ReplayContext {}

impl ConsumerContext for ReplayContext {
    fn post_rebalance(&self, base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                if partitions.count() == 0 {
                    return;
                }
                if self.policy == ReplayPolicy::FromCommitted {
                    info!("Assigned {} partitions, resuming from committed offsets", partitions.count());
                    return;
                }
                match rewind_to_earliest(partitions)
                    .and_then(|rewound| base_consumer.assign(&rewound))
                {
                    Ok(()) => info!(
                        "Assigned {} partitions, rewound to earliest offset",
                        partitions.count()
                    ),
                    Err(e) => warn!("Failed to rewind assigned partitions: {e}"),
                }
            }
            Rebalance::Revoke(partitions) => {
                debug!("Revoked {} partitions", partitions.count());
            }
            Rebalance::Error(e) => warn!("Rebalance error: {e}"),
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        if let Err(e) = result {
            warn!("Failed to commit offsets for {} partitions: {e}", offsets.count());
        }
    }
}

/// Same assignment with every partition positioned at its earliest offset.
pub fn rewind_to_earliest(assigned: &TopicPartitionList) -> KafkaResult<TopicPartitionList> {
    let mut rewound = assigned.clone();
    rewound.set_all_offsets(Offset::Beginning)?;
    Ok(rewound)
}

/// Group consumer over an rdkafka [`StreamConsumer`].
pub struct KafkaLogConsumer {
    consumer: StreamConsumer<ReplayContext>,
    seek_timeout: Duration,
}

impl KafkaLogConsumer {
    pub fn new(
        config: &KafkaConfig,
        topic: &str,
        group_id: &str,
        policy: ReplayPolicy,
    ) -> Result<Self, ReplicationError> {
        let consumer: StreamConsumer<ReplayContext> = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set(
                "session.timeout.ms",
                config.session_timeout.as_millis().to_string(),
            )
            .set("enable.partition.eof", "false")
            .create_with_context(ReplayContext::new(policy))?;

        consumer.subscribe(&[topic])?;
        info!("Subscribed to '{topic}' as group '{group_id}' ({policy:?})");

        Ok(Self {
            consumer,
            seek_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl LogConsumer for KafkaLogConsumer {
    async fn next_delivery(
        &mut self,
        wait: Duration,
    ) -> Result<Option<Delivery>, ReplicationError> {
        match tokio::time::timeout(wait, self.consumer.recv()).await {
            Ok(Ok(message)) => Ok(Some(Delivery {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })),
            Ok(Err(e)) => Err(ReplicationError::Consume(format!(
                "Error receiving message: {e}"
            ))),
            Err(_) => Ok(None),
        }
    }

    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<(), ReplicationError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Sync)?;
        Ok(())
    }

    async fn redeliver(&mut self, delivery: &Delivery) -> Result<(), ReplicationError> {
        self.consumer.seek(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset),
            self.seek_timeout,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewind_to_earliest_overrides_offsets() {
        let mut assigned = TopicPartitionList::new();
        assigned
            .add_partition_offset("cdr-topic", 0, Offset::Offset(42))
            .unwrap();
        assigned
            .add_partition_offset("cdr-topic", 1, Offset::Stored)
            .unwrap();

        let rewound = rewind_to_earliest(&assigned).unwrap();

        assert_eq!(rewound.count(), 2);
        for element in rewound.elements() {
            assert_eq!(element.offset(), Offset::Beginning);
        }
        // the assignment handed in is left untouched
        let original = assigned.find_partition("cdr-topic", 0).unwrap();
        assert_eq!(original.offset(), Offset::Offset(42));
    }

    #[test]
    fn test_rewind_of_empty_assignment() {
        let rewound = rewind_to_earliest(&TopicPartitionList::new()).unwrap();
        assert_eq!(rewound.count(), 0);
    }

    #[test]
    fn test_default_config() {
        let config = KafkaConfig::default();
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.message_timeout, Duration::from_millis(5000));
    }
}
