//! Shared primitives handed to every task: the two FIFO queues, the cycle
//! semaphore, and the blackboard.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore, mpsc};
use tokio::time;

use aurus_ranging::DistanceSample;

use crate::blackboard::Blackboard;

/// Depth of both the time queue and the distance queue.
pub const QUEUE_CAPACITY: usize = 32;

/// Microseconds since boot, as captured by the edge interrupt.
pub type TimestampUs = u64;

/// Why a non-blocking push was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    Full,
    Closed,
}

/// Writing half of a bounded FIFO. Never blocks, so it is safe to call from
/// interrupt context.
#[derive(Debug, Clone)]
pub struct QueueProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> QueueProducer<T> {
    pub fn try_push(&self, item: T) -> Result<(), PushError> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

/// Reading half of a bounded FIFO. Each queue has exactly one reader; the
/// async mutex only makes the half shareable through the context.
#[derive(Debug)]
pub struct QueueConsumer<T> {
    rx: AsyncMutex<mpsc::Receiver<T>>,
}

impl<T> QueueConsumer<T> {
    /// Wait up to `timeout` for the next item. `None` on timeout.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        time::timeout(timeout, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Next item if one is queued. Also `None` while the reader is parked in
    /// [`recv_timeout`](Self::recv_timeout).
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

/// Create an empty FIFO holding at most `capacity` items.
pub fn bounded<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueProducer { tx }, QueueConsumer { rx: AsyncMutex::new(rx) })
}

/// Semaphore that holds at most one permit.
#[derive(Debug)]
pub struct BinarySemaphore {
    permits: Semaphore,
    give_lock: Mutex<()>,
}

impl BinarySemaphore {
    pub fn new(signaled: bool) -> Self {
        Self {
            permits: Semaphore::new(usize::from(signaled)),
            give_lock: Mutex::new(()),
        }
    }

    /// Signal. Giving an already signaled semaphore is a no-op.
    pub fn give(&self) {
        let _guard = self.give_lock.lock();
        if self.permits.available_permits() == 0 {
            self.permits.add_permits(1);
        }
    }

    /// Wait up to `timeout` for the signal. Returns `true` if it was taken.
    pub async fn take(&self, timeout: Duration) -> bool {
        match time::timeout(timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            _ => false,
        }
    }

    pub fn try_take(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_signaled(&self) -> bool {
        self.permits.available_permits() > 0
    }
}

/// Process-wide handles, created once at start-up and shared by reference.
#[derive(Debug)]
pub struct SonarContext {
    pub time_tx: QueueProducer<TimestampUs>,
    pub time_rx: QueueConsumer<TimestampUs>,
    pub distance_tx: QueueProducer<DistanceSample>,
    pub distance_rx: QueueConsumer<DistanceSample>,
    /// Starts signaled so the first trigger fires immediately.
    pub cycle: BinarySemaphore,
    pub bb: Blackboard,
}

impl SonarContext {
    pub fn new() -> Arc<Self> {
        let (time_tx, time_rx) = bounded(QUEUE_CAPACITY);
        let (distance_tx, distance_rx) = bounded(QUEUE_CAPACITY);
        Arc::new(Self {
            time_tx,
            time_rx,
            distance_tx,
            distance_rx,
            cycle: BinarySemaphore::new(true),
            bb: Blackboard::default(),
        })
    }
}
