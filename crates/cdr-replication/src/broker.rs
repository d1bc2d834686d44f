//! Broker seams used by the publisher and subscriber.

use crate::error::ReplicationError;
use async_trait::async_trait;
use std::time::Duration;

/// Where a subscriber starts reading after partitions are assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Rewind every assigned partition to its earliest offset.
    #[default]
    FromEarliest,
    /// Resume from the group's committed offsets.
    FromCommitted,
}

/// One message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Appends messages to topics.
#[async_trait]
pub trait LogProducer: Send + Sync {
    /// Append `payload` to `topic`. Unkeyed messages go to a partition of
    /// the broker's choosing.
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<(), ReplicationError>;
}

/// Group member reading one topic.
#[async_trait]
pub trait LogConsumer: Send {
    /// Wait up to `wait` for the next message.
    async fn next_delivery(&mut self, wait: Duration)
        -> Result<Option<Delivery>, ReplicationError>;

    /// Commit the group's offset past `delivery`.
    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<(), ReplicationError>;

    /// Rewind the partition so `delivery` is handed out again.
    async fn redeliver(&mut self, delivery: &Delivery) -> Result<(), ReplicationError>;
}
