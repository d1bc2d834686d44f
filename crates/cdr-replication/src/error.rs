use cdr_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message at {topic}/{partition}@{offset}: {source}")]
    Decode {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: serde_json::Error,
    },

    /// The broker did not accept a publish.
    #[error("Delivery to topic '{topic}' failed: {message}")]
    Delivery { topic: String, message: String },

    /// Consuming from the broker failed.
    #[error("Consume error: {0}")]
    Consume(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
