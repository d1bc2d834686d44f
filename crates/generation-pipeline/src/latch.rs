//! Countdown join barrier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A one-shot barrier that opens once it has been counted down `count` times.
#[derive(Clone, Debug)]
pub struct CountdownLatch {
    inner: Arc<LatchInner>,
}

#[derive(Debug)]
struct LatchInner {
    count: AtomicUsize,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(LatchInner {
                count: AtomicUsize::new(count),
                notify: Notify::new(),
            }),
        }
    }

    /// Current count. Zero means the latch is open.
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Decrement the count, waking waiters when it reaches zero. Never underflows.
    pub fn count_down(&self) {
        let previous = self
            .inner
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
        if previous == Ok(1) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Guard that counts the latch down exactly once when dropped.
    ///
    /// Moving the guard into a task makes the count-down happen on normal
    /// completion, on error returns, on panic and on abort alike.
    pub fn guard(&self) -> LatchGuard {
        LatchGuard {
            latch: self.clone(),
        }
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Counts its latch down on drop.
#[derive(Debug)]
pub struct LatchGuard {
    latch: CountdownLatch,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}
