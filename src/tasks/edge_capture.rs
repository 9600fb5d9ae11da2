use std::sync::Arc;

use crate::platform::{Edge, EdgeSink, MonotonicClock};
use crate::sync::{QueueProducer, TimestampUs};

/// Echo pin interrupt handler: timestamps every edge into the time queue.
///
/// Edge type is not inspected; the echo task relies on rising and falling
/// edges arriving in order. A full queue drops the timestamp.
pub struct EdgeCapture {
    clock: Arc<dyn MonotonicClock>,
    time_tx: QueueProducer<TimestampUs>,
}

impl EdgeCapture {
    pub fn new(clock: Arc<dyn MonotonicClock>, time_tx: QueueProducer<TimestampUs>) -> Self {
        Self { clock, time_tx }
    }
}

impl EdgeSink for EdgeCapture {
    fn on_edge(&self, _edge: Edge) {
        let now = self.clock.monotonic_micros();
        let _ = self.time_tx.try_push(now);
    }
}
