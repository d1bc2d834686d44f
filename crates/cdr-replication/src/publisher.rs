use crate::broker::LogProducer;
use crate::codec::encode_record;
use crate::error::ReplicationError;
use cdr_core::Cdr;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of [`ReplicationPublisher::publish_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: usize,
    pub failed: usize,
}

/// Appends records to the replication topic.
pub struct ReplicationPublisher {
    producer: Arc<dyn LogProducer>,
    topic: String,
}

impl ReplicationPublisher {
    pub fn new(producer: Arc<dyn LogProducer>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send one record, unkeyed. Returns once the broker client accepted it.
    pub async fn publish(&self, record: &Cdr) -> Result<(), ReplicationError> {
        let payload = encode_record(record)?;
        self.producer.send(&self.topic, None, &payload).await
    }

    /// Send every record. Failures are logged and counted, never fatal.
    pub async fn publish_all(&self, records: &[Cdr]) -> PublishReport {
        let mut report = PublishReport::default();
        for record in records {
            match self.publish(record).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    error!("Failed to publish {record}: {e}");
                    report.failed += 1;
                }
            }
        }
        info!(
            "Published {} records to '{}' ({} failed)",
            report.sent, self.topic, report.failed
        );
        report
    }
}
