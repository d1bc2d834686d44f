//! Bounded hand-off buffer between the generator and the collector.

use crate::error::QueueError;
use cdr_core::Cdr;
use std::time::Duration;
use tokio::sync::mpsc;

/// Factory for a bounded FIFO queue of records.
///
/// Puts block while the queue is full; polls wait at most a timeout and
/// report "nothing available" instead of blocking forever.
pub struct GenerationQueue;

impl GenerationQueue {
    /// Create a queue holding at most `capacity` records.
    pub fn bounded(capacity: usize) -> Result<(QueueProducer, QueueConsumer), QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok((QueueProducer { tx }, QueueConsumer { rx, capacity }))
    }
}

/// Producing half of a [`GenerationQueue`].
#[derive(Clone, Debug)]
pub struct QueueProducer {
    tx: mpsc::Sender<Cdr>,
}

impl QueueProducer {
    /// Enqueue a record, waiting for space while the queue is full.
    pub async fn put(&self, record: Cdr) -> Result<(), QueueError> {
        self.tx.send(record).await.map_err(|_| QueueError::Closed)
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Records currently buffered.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consuming half of a [`GenerationQueue`].
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::Receiver<Cdr>,
    capacity: usize,
}

impl QueueConsumer {
    /// Dequeue the oldest record, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// `Err(QueueError::Closed)` once every producer is gone and the
    /// buffer is drained.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Cdr>, QueueError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => Err(QueueError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
