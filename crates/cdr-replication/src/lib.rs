//! CDR replication through a partitioned log.
//!
//! ```text
//!  batch ──▶ ReplicationPublisher ──▶ topic "cdr-topic" ──▶ ReplicationSubscriber ──▶ CdrStore
//!                                         ▲                    │ on assign: rewind
//!                                         └────────────────────┘ every partition to earliest
//! ```
//!
//! The subscriber treats the topic as a bootstrap snapshot: every time
//! partitions are assigned, including the first join, it rewinds them to
//! the earliest offset regardless of committed offsets. Each delivered
//! record has its id cleared before it is saved, so the store assigns a
//! fresh one. Replaying the topic therefore inserts duplicates; delivery is
//! at-least-once and nothing here deduplicates.
//!
//! The broker is reached through [`LogProducer`] and [`LogConsumer`]:
//! [`kafka`] implements them over rdkafka, [`memory`] over an in-process
//! log with the same offset and group semantics.

pub mod broker;
pub mod codec;
pub mod error;
pub mod kafka;
pub mod memory;
pub mod publisher;
pub mod subscriber;

pub use broker::{Delivery, LogConsumer, LogProducer, ReplayPolicy};
pub use codec::{decode_record, encode_record};
pub use error::ReplicationError;
pub use kafka::{KafkaConfig, KafkaLogConsumer, KafkaLogProducer};
pub use memory::{MemoryBroker, MemoryConsumer, MemoryProducer};
pub use publisher::{PublishReport, ReplicationPublisher};
pub use subscriber::{ReplicationSubscriber, SubscriberConfig, SubscriberStats};

/// Topic the replication feed is published to by default.
pub const DEFAULT_TOPIC: &str = "cdr-topic";

/// Consumer group of the replay subscriber by default.
pub const DEFAULT_GROUP_ID: &str = "backend-group";
