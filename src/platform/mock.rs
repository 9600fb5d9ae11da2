//! Mock platform for testing
//!
//! A manually driven clock plus a GPIO double that records every level change
//! and lets tests raise echo edges, either by hand or scripted per trigger pulse.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ECHO_PIN, Edge, EdgeSink, Gpio, Level, MonotonicClock, Pin, PlatformError, Result, TRIG_PIN};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        Self { now_us: AtomicU64::new(start_us) }
    }

    pub fn set(&self, us: u64) {
        self.now_us.store(us, Ordering::SeqCst);
    }

    pub fn advance(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn monotonic_micros(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

/// What the mock sensor does after a trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoResponse {
    /// Rising edge now, falling edge `width_us` later.
    Pulse { width_us: u64 },
    /// Rising edge only; the falling edge is lost.
    RisingOnly,
    /// No edges at all.
    Silent,
}

#[derive(Default)]
struct MockState {
    outputs: HashMap<Pin, Level>,
    history: Vec<(Pin, Level, u64)>,
    sinks: HashMap<Pin, Arc<dyn EdgeSink>>,
    script: VecDeque<EchoResponse>,
}

/// Recording GPIO double.
pub struct MockGpio {
    clock: Arc<ManualClock>,
    state: Mutex<MockState>,
}

impl MockGpio {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self { clock, state: Mutex::new(MockState::default()) }
    }

    /// Queue the responses for upcoming trigger pulses, oldest first.
    pub fn script_echoes<I: IntoIterator<Item = EchoResponse>>(&self, responses: I) {
        self.state.lock().script.extend(responses);
    }

    /// Raise an edge on `pin` as the interrupt controller would.
    pub fn fire_edge(&self, pin: Pin, edge: Edge) {
        let sink = self.state.lock().sinks.get(&pin).cloned();
        if let Some(sink) = sink {
            sink.on_edge(edge);
        }
    }

    /// Raise a full echo pulse on the echo pin at the given instants.
    pub fn fire_echo(&self, start_us: u64, end_us: u64) {
        self.clock.set(start_us);
        self.fire_edge(ECHO_PIN, Edge::Rising);
        self.clock.set(end_us);
        self.fire_edge(ECHO_PIN, Edge::Falling);
    }

    pub fn has_edge_sink(&self, pin: Pin) -> bool {
        self.state.lock().sinks.contains_key(&pin)
    }

    pub fn level(&self, pin: Pin) -> Option<Level> {
        self.state.lock().outputs.get(&pin).copied()
    }

    /// Completed high-then-low pulses on `pin`.
    pub fn pulse_count(&self, pin: Pin) -> usize {
        self.state
            .lock()
            .history
            .windows(2)
            .filter(|w| w[0].0 == pin && w[0].1 == Level::High && w[1].0 == pin && w[1].1 == Level::Low)
            .count()
    }

    fn respond_to_trigger(&self) {
        let response = self.state.lock().script.pop_front().unwrap_or(EchoResponse::Silent);
        match response {
            EchoResponse::Pulse { width_us } => {
                let start = self.clock.monotonic_micros();
                self.fire_echo(start, start + width_us);
            }
            EchoResponse::RisingOnly => self.fire_edge(ECHO_PIN, Edge::Rising),
            EchoResponse::Silent => {}
        }
    }
}

impl Gpio for MockGpio {
    fn configure_output(&self, pin: Pin) -> Result<()> {
        let mut state = self.state.lock();
        if state.sinks.contains_key(&pin) {
            return Err(PlatformError::PinAlreadyClaimed(pin));
        }
        state.outputs.insert(pin, Level::Low);
        Ok(())
    }

    fn configure_input_with_edge_interrupt(&self, pin: Pin, sink: Arc<dyn EdgeSink>) -> Result<()> {
        let mut state = self.state.lock();
        if state.outputs.contains_key(&pin) || state.sinks.contains_key(&pin) {
            return Err(PlatformError::PinAlreadyClaimed(pin));
        }
        state.sinks.insert(pin, sink);
        Ok(())
    }

    fn set_level(&self, pin: Pin, level: Level) -> Result<()> {
        let previous = {
            let mut state = self.state.lock();
            let now = self.clock.monotonic_micros();
            let slot = state.outputs.get_mut(&pin).ok_or(PlatformError::PinNotOutput(pin))?;
            let previous = *slot;
            *slot = level;
            state.history.push((pin, level, now));
            previous
        };

        // The sensor starts ranging on the falling edge of the trigger pulse
        if pin == TRIG_PIN && previous == Level::High && level == Level::Low {
            self.respond_to_trigger();
        }
        Ok(())
    }

    fn clock(&self) -> Arc<dyn MonotonicClock> {
        self.clock.clone()
    }
}
