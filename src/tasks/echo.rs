use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use aurus_ranging::{DistanceSample, EchoPulse};

use crate::blackboard::{DropReason, raise_fault, record_drop, record_emit, record_queue_full};
use crate::platform::{ECHO_PIN, Gpio};
use crate::sync::SonarContext;
use crate::tasks::edge_capture::EdgeCapture;

/// Wait for each of the two edge timestamps of a cycle.
pub const ECHO_EDGE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// A sample (possibly the out-of-range sentinel) was handed to the display.
    Emitted(DistanceSample),
    /// Nothing was emitted and the cycle semaphore was left alone.
    Dropped(DropReason),
}

/// Drain one start/end timestamp pair and turn it into a distance sample.
pub async fn echo_cycle(ctx: &SonarContext) -> CycleOutcome {
    let Some(start_us) = ctx.time_rx.recv_timeout(ECHO_EDGE_TIMEOUT).await else {
        trace!("No echo start edge");
        record_drop(&ctx.bb, DropReason::MissingStart);
        return CycleOutcome::Dropped(DropReason::MissingStart);
    };

    let Some(end_us) = ctx.time_rx.recv_timeout(ECHO_EDGE_TIMEOUT).await else {
        debug!(start_us, "Echo end edge never arrived, cycle abandoned");
        record_drop(&ctx.bb, DropReason::MissingEnd);
        return CycleOutcome::Dropped(DropReason::MissingEnd);
    };

    match DistanceSample::from_pulse(EchoPulse::new(start_us, end_us)) {
        Ok(sample) => {
            // A sample that never reached the display is not counted as emitted
            match ctx.distance_tx.try_push(sample) {
                Ok(()) => record_emit(&ctx.bb, sample),
                Err(_) => {
                    warn!(%sample, "Distance queue full, sample dropped");
                    record_queue_full(&ctx.bb);
                    raise_fault(&ctx.bb, "distance queue full");
                }
            }
            ctx.cycle.give();
            debug!(start_us, end_us, cm = sample.cm(), "Echo measured");
            CycleOutcome::Emitted(sample)
        }
        Err(e) => {
            debug!(error = %e, "Echo cycle dropped");
            record_drop(&ctx.bb, DropReason::Inverted);
            CycleOutcome::Dropped(DropReason::Inverted)
        }
    }
}

pub async fn echo_task(gpio: Arc<dyn Gpio>, ctx: Arc<SonarContext>) -> anyhow::Result<()> {
    let capture = Arc::new(EdgeCapture::new(gpio.clock(), ctx.time_tx.clone()));
    gpio.configure_input_with_edge_interrupt(ECHO_PIN, capture)?;
    info!(pin = %ECHO_PIN, "Echo task started.");

    loop {
        echo_cycle(&ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::snapshot;
    use crate::sync::QUEUE_CAPACITY;
    use tokio::time;

    fn drained() -> Arc<SonarContext> {
        let ctx = SonarContext::new();
        assert!(ctx.cycle.try_take());
        ctx
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_pair_emits_and_signals() {
        let ctx = drained();
        ctx.time_tx.try_push(1000).unwrap();
        ctx.time_tx.try_push(3000).unwrap();

        let CycleOutcome::Emitted(sample) = echo_cycle(&ctx).await else {
            panic!("expected an emitted sample");
        };
        assert!((sample.cm() - 34.3).abs() < 1e-3);
        assert_eq!(ctx.distance_rx.try_recv(), Some(sample));
        assert!(ctx.cycle.is_signaled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_pulse_emits_sentinel() {
        let ctx = drained();
        ctx.time_tx.try_push(1000).unwrap();
        ctx.time_tx.try_push(1050).unwrap();

        assert_eq!(echo_cycle(&ctx).await, CycleOutcome::Emitted(DistanceSample::OUT_OF_RANGE));
        assert_eq!(ctx.distance_rx.try_recv(), Some(DistanceSample::OUT_OF_RANGE));
        assert!(ctx.cycle.is_signaled());
        assert_eq!(snapshot(&ctx.bb).out_of_range, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_end_edge_drops_cycle() {
        let ctx = drained();
        ctx.time_tx.try_push(1000).unwrap();

        let started = time::Instant::now();
        assert_eq!(echo_cycle(&ctx).await, CycleOutcome::Dropped(DropReason::MissingEnd));
        assert!(started.elapsed() >= ECHO_EDGE_TIMEOUT);
        assert_eq!(ctx.distance_rx.try_recv(), None);
        assert!(!ctx.cycle.is_signaled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_start_edge_drops_cycle() {
        let ctx = drained();
        assert_eq!(echo_cycle(&ctx).await, CycleOutcome::Dropped(DropReason::MissingStart));
        assert_eq!(ctx.distance_rx.try_recv(), None);
        assert!(!ctx.cycle.is_signaled());
        assert_eq!(snapshot(&ctx.bb).missing_start, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inverted_pair_drops_cycle() {
        let ctx = drained();
        ctx.time_tx.try_push(3000).unwrap();
        ctx.time_tx.try_push(1000).unwrap();

        assert_eq!(echo_cycle(&ctx).await, CycleOutcome::Dropped(DropReason::Inverted));
        assert_eq!(ctx.distance_rx.try_recv(), None);
        assert!(!ctx.cycle.is_signaled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_distance_queue_still_signals() {
        let ctx = drained();
        for _ in 0..QUEUE_CAPACITY {
            ctx.distance_tx.try_push(DistanceSample::from_cm(10.0)).unwrap();
        }
        ctx.time_tx.try_push(1000).unwrap();
        ctx.time_tx.try_push(3000).unwrap();

        assert!(matches!(echo_cycle(&ctx).await, CycleOutcome::Emitted(_)));
        assert!(ctx.cycle.is_signaled());
        let s = snapshot(&ctx.bb);
        assert_eq!(s.distance_queue_full, 1);
        assert_eq!(s.emitted, 0);
        assert_eq!(s.last_distance, None);
        assert_eq!(s.faults, vec!["distance queue full".to_string()]);
    }
}
