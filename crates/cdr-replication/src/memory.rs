//! In-process partitioned log.
//!
//! Mirrors the parts of Kafka the replication path relies on: partitioned
//! topics, per-group committed offsets and a fresh assignment every time a
//! consumer joins.

use crate::broker::{Delivery, LogConsumer, LogProducer, ReplayPolicy};
use crate::error::ReplicationError;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredMessage {
    key: Option<Vec<u8>>,
    payload: Vec<u8>,
}

#[derive(Debug)]
struct BrokerState {
    default_partitions: usize,
    topics: BTreeMap<String, Vec<Vec<StoredMessage>>>,
    committed: HashMap<(String, String, i32), i64>,
    next_partition: usize,
    failing_sends: usize,
    joins: u64,
}

impl BrokerState {
    fn topic_mut(&mut self, topic: &str) -> &mut Vec<Vec<StoredMessage>> {
        let partitions = self.default_partitions;
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions])
    }
}

/// Shared handle to an in-process broker.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MemoryBroker {
    /// Topics created implicitly get `default_partitions` partitions.
    pub fn new(default_partitions: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                default_partitions: default_partitions.max(1),
                topics: BTreeMap::new(),
                committed: HashMap::new(),
                next_partition: 0,
                failing_sends: 0,
                joins: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create `topic` unless it exists.
    pub fn create_topic(&self, topic: &str, partitions: usize) {
        self.state()
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1)]);
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            broker: self.clone(),
        }
    }

    /// Join `group_id` on `topic` and receive an assignment of every partition.
    pub fn consumer(&self, topic: &str, group_id: &str, policy: ReplayPolicy) -> MemoryConsumer {
        let positions = {
            let mut state = self.state();
            state.joins += 1;
            let partitions = state.topic_mut(topic).len();
            let positions: Vec<i64> = (0..partitions)
                .map(|partition| start_position(&state, policy, group_id, topic, partition as i32))
                .collect();
            positions
        };
        tracing::debug!("Group '{group_id}' joined '{topic}' ({policy:?})");
        MemoryConsumer {
            broker: self.clone(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            policy,
            positions,
            scan_from: 0,
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn partition_count(&self, topic: &str) -> usize {
        self.state().topics.get(topic).map_or(0, Vec::len)
    }

    pub fn message_count(&self, topic: &str) -> usize {
        self.state()
            .topics
            .get(topic)
            .map_or(0, |partitions| partitions.iter().map(Vec::len).sum())
    }

    /// Every message of `topic`, partition by partition.
    pub fn messages(&self, topic: &str) -> Vec<Delivery> {
        let state = self.state();
        let Some(partitions) = state.topics.get(topic) else {
            return Vec::new();
        };
        partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter().enumerate().map(move |(offset, message)| Delivery {
                    topic: topic.to_string(),
                    partition: partition as i32,
                    offset: offset as i64,
                    key: message.key.clone(),
                    payload: message.payload.clone(),
                })
            })
            .collect()
    }

    pub fn committed_offset(&self, group_id: &str, topic: &str, partition: i32) -> Option<i64> {
        self.state()
            .committed
            .get(&(group_id.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Number of consumer joins so far.
    pub fn joins(&self) -> u64 {
        self.state().joins
    }

    /// Reject the next `count` sends.
    pub fn fail_next_sends(&self, count: usize) {
        self.state().failing_sends = count;
    }
}

fn start_position(
    state: &BrokerState,
    policy: ReplayPolicy,
    group_id: &str,
    topic: &str,
    partition: i32,
) -> i64 {
    match policy {
        ReplayPolicy::FromEarliest => 0,
        ReplayPolicy::FromCommitted => state
            .committed
            .get(&(group_id.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or(0),
    }
}

/// Producer handle of a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryProducer {
    broker: MemoryBroker,
}

#[async_trait]
impl LogProducer for MemoryProducer {
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<(), ReplicationError> {
        let mut state = self.broker.state();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(ReplicationError::Delivery {
                topic: topic.to_string(),
                message: "injected send failure".to_string(),
            });
        }

        let next = state.next_partition;
        let partitions = state.topic_mut(topic);
        let partition = match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % partitions.len() as u64) as usize
            }
            None => next % partitions.len(),
        };
        partitions[partition].push(StoredMessage {
            key: key.map(<[u8]>::to_vec),
            payload: payload.to_vec(),
        });
        if key.is_none() {
            state.next_partition = next.wrapping_add(1);
        }
        Ok(())
    }
}

/// Group member of a [`MemoryBroker`] topic.
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    topic: String,
    group_id: String,
    policy: ReplayPolicy,
    positions: Vec<i64>,
    scan_from: usize,
    poll_interval: Duration,
}

impl MemoryConsumer {
    /// Current read position of `partition`.
    pub fn position(&self, partition: i32) -> Option<i64> {
        self.positions.get(partition as usize).copied()
    }

    fn take_next(&mut self) -> Option<Delivery> {
        let mut state = self.broker.state();
        let partitions = state.topic_mut(&self.topic).len();
        while self.positions.len() < partitions {
            let partition = self.positions.len() as i32;
            let start = start_position(&state, self.policy, &self.group_id, &self.topic, partition);
            self.positions.push(start);
        }

        let logs = state.topic_mut(&self.topic);
        for step in 0..partitions {
            let partition = (self.scan_from + step) % partitions;
            let position = self.positions[partition];
            if let Some(message) = logs[partition].get(position as usize) {
                self.positions[partition] = position + 1;
                self.scan_from = partition + 1;
                return Some(Delivery {
                    topic: self.topic.clone(),
                    partition: partition as i32,
                    offset: position,
                    key: message.key.clone(),
                    payload: message.payload.clone(),
                });
            }
        }
        None
    }
}

#[async_trait]
impl LogConsumer for MemoryConsumer {
    async fn next_delivery(
        &mut self,
        wait: Duration,
    ) -> Result<Option<Delivery>, ReplicationError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(delivery) = self.take_next() {
                return Ok(Some(delivery));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<(), ReplicationError> {
        self.broker.state().committed.insert(
            (self.group_id.clone(), delivery.topic.clone(), delivery.partition),
            delivery.offset + 1,
        );
        Ok(())
    }

    async fn redeliver(&mut self, delivery: &Delivery) -> Result<(), ReplicationError> {
        let position = self
            .positions
            .get_mut(delivery.partition as usize)
            .ok_or_else(|| {
                ReplicationError::Consume(format!(
                    "partition {} is not assigned",
                    delivery.partition
                ))
            })?;
        *position = delivery.offset;
        Ok(())
    }
}
