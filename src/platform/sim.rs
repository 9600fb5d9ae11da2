//! Host-side simulation of an HC-SR04 style pulse-echo sensor.
//!
//! The trigger pin's falling edge wakes a dedicated sensor thread which, after
//! the ultrasonic burst, raises the echo pin's rising edge, spin-sleeps for the
//! pulse width of the current simulated target, and raises the falling edge.

use parking_lot::Mutex;
use rand::Rng;
use spin_sleep::SpinSleeper;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use aurus_ranging::{MAX_RANGE_CM, pulse_width_for};

use super::{ECHO_PIN, Edge, EdgeSink, Gpio, Level, MonotonicClock, Pin, PlatformError, Result, TRIG_PIN};

/// Echo width the sensor reports when nothing reflects the burst.
pub const NO_OBSTACLE_PULSE_US: u64 = 38_000;

/// Delay between the trigger falling edge and the echo rising edge (8-cycle 40 kHz burst).
pub const BURST_DELAY_US: u64 = 450;

/// Microseconds since this clock was created.
#[derive(Debug)]
pub struct StdClock {
    boot: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self { boot: Instant::now() }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdClock {
    fn monotonic_micros(&self) -> u64 {
        self.boot.elapsed().as_micros() as u64
    }
}

/// Where the simulated obstacle sits over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetScenario {
    Fixed { cm: f32 },
    /// Triangle wave between `min_cm` and `max_cm`.
    Sweep { min_cm: f32, max_cm: f32, period: Duration },
}

impl TargetScenario {
    pub fn distance_at(&self, elapsed: Duration) -> f32 {
        match *self {
            TargetScenario::Fixed { cm } => cm,
            TargetScenario::Sweep { min_cm, max_cm, period } => {
                if period.is_zero() {
                    return min_cm;
                }
                let phase = (elapsed.as_secs_f64() % period.as_secs_f64()) / period.as_secs_f64();
                let tri = 1.0 - (2.0 * phase - 1.0).abs();
                min_cm + (max_cm - min_cm) * tri as f32
            }
        }
    }
}

/// Physical behaviour of the simulated sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorModel {
    pub scenario: TargetScenario,
    /// Probability in `[0, 1]` that the falling edge of an echo is lost.
    pub echo_loss_rate: f64,
    /// Uniform jitter added to every pulse width.
    pub jitter_us: u64,
}

impl SensorModel {
    /// Echo width for a target at `cm`, before jitter.
    pub fn pulse_width_us(cm: f32) -> u64 {
        if cm > MAX_RANGE_CM {
            NO_OBSTACLE_PULSE_US
        } else {
            pulse_width_for(cm)
        }
    }
}

type Sinks = Arc<Mutex<HashMap<Pin, Arc<dyn EdgeSink>>>>;

/// Simulated board: output pins are tracked in memory, the echo pin is driven
/// by the sensor thread.
pub struct SimGpio {
    clock: Arc<StdClock>,
    outputs: Mutex<HashMap<Pin, Level>>,
    sinks: Sinks,
    trigger_tx: Mutex<mpsc::Sender<u64>>,
}

impl SimGpio {
    /// Build the board and start the sensor thread.
    pub fn start(model: SensorModel) -> anyhow::Result<Self> {
        let clock = Arc::new(StdClock::new());
        let sinks: Sinks = Arc::default();
        let (trigger_tx, trigger_rx) = mpsc::channel::<u64>();

        info!(?model, "Spawning simulated sensor thread...");
        std::thread::Builder::new().name("sonar-sim".into()).spawn({
            let sinks = Arc::clone(&sinks);
            let boot = Instant::now();
            move || run_sensor(model, boot, trigger_rx, sinks)
        })?;

        Ok(Self {
            clock,
            outputs: Mutex::new(HashMap::new()),
            sinks,
            trigger_tx: Mutex::new(trigger_tx),
        })
    }
}

fn fire(sinks: &Sinks, pin: Pin, edge: Edge) {
    let sink = sinks.lock().get(&pin).cloned();
    if let Some(sink) = sink {
        sink.on_edge(edge);
    }
}

fn run_sensor(model: SensorModel, boot: Instant, trigger_rx: mpsc::Receiver<u64>, sinks: Sinks) {
    info!("Simulated sensor thread started.");
    let sleeper = SpinSleeper::default();
    let mut rng = rand::rng();
    let loss_rate = model.echo_loss_rate.clamp(0.0, 1.0);

    // Exits once the board (and its trigger sender) is dropped
    while let Ok(triggered_at) = trigger_rx.recv() {
        sleeper.sleep(Duration::from_micros(BURST_DELAY_US));

        let target_cm = model.scenario.distance_at(boot.elapsed());
        let mut width = SensorModel::pulse_width_us(target_cm);
        if model.jitter_us > 0 {
            let j = model.jitter_us as i64;
            width = (width as i64 + rng.random_range(-j..=j)).max(1) as u64;
        }
        trace!(triggered_at, target_cm, width, "Simulated echo");

        fire(&sinks, ECHO_PIN, Edge::Rising);
        sleeper.sleep(Duration::from_micros(width));
        if rng.random_bool(loss_rate) {
            debug!(target_cm, "Simulated echo lost its falling edge");
            continue;
        }
        fire(&sinks, ECHO_PIN, Edge::Falling);
    }
    info!("Simulated sensor thread finished.");
}

impl Gpio for SimGpio {
    fn configure_output(&self, pin: Pin) -> Result<()> {
        if self.sinks.lock().contains_key(&pin) {
            return Err(PlatformError::PinAlreadyClaimed(pin));
        }
        self.outputs.lock().insert(pin, Level::Low);
        Ok(())
    }

    fn configure_input_with_edge_interrupt(&self, pin: Pin, sink: Arc<dyn EdgeSink>) -> Result<()> {
        if self.outputs.lock().contains_key(&pin) {
            return Err(PlatformError::PinAlreadyClaimed(pin));
        }
        let mut sinks = self.sinks.lock();
        if sinks.contains_key(&pin) {
            return Err(PlatformError::PinAlreadyClaimed(pin));
        }
        sinks.insert(pin, sink);
        Ok(())
    }

    fn set_level(&self, pin: Pin, level: Level) -> Result<()> {
        let previous = {
            let mut outputs = self.outputs.lock();
            let slot = outputs.get_mut(&pin).ok_or(PlatformError::PinNotOutput(pin))?;
            std::mem::replace(slot, level)
        };

        if pin == TRIG_PIN && previous == Level::High && level == Level::Low {
            self.trigger_tx
                .lock()
                .send(self.monotonic_micros())
                .map_err(|_| PlatformError::Disconnected("sensor thread"))?;
        }
        Ok(())
    }

    fn clock(&self) -> Arc<dyn MonotonicClock> {
        self.clock.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_is_triangle() {
        let sweep = TargetScenario::Sweep { min_cm: 10.0, max_cm: 110.0, period: Duration::from_secs(4) };
        assert!((sweep.distance_at(Duration::ZERO) - 10.0).abs() < 1e-3);
        assert!((sweep.distance_at(Duration::from_secs(1)) - 60.0).abs() < 1e-3);
        assert!((sweep.distance_at(Duration::from_secs(2)) - 110.0).abs() < 1e-3);
        assert!((sweep.distance_at(Duration::from_secs(3)) - 60.0).abs() < 1e-3);
        assert!((sweep.distance_at(Duration::from_secs(4)) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_far_target_reports_no_obstacle_pulse() {
        assert_eq!(SensorModel::pulse_width_us(650.0), NO_OBSTACLE_PULSE_US);
        assert_eq!(SensorModel::pulse_width_us(34.3), 2000);
    }

    #[test]
    fn test_std_clock_is_monotonic() {
        let clock = StdClock::new();
        let a = clock.monotonic_micros();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.monotonic_micros() > a);
    }

    const EDGE_WAIT: Duration = Duration::from_secs(1);

    /// Forwards every edge, stamped with the board clock, to the test thread.
    struct ChannelSink {
        clock: Arc<dyn MonotonicClock>,
        tx: Mutex<mpsc::Sender<(Edge, u64)>>,
    }

    impl EdgeSink for ChannelSink {
        fn on_edge(&self, edge: Edge) {
            let _ = self.tx.lock().send((edge, self.clock.monotonic_micros()));
        }
    }

    fn armed_board(scenario: TargetScenario, echo_loss_rate: f64) -> (SimGpio, mpsc::Receiver<(Edge, u64)>) {
        let gpio = SimGpio::start(SensorModel { scenario, echo_loss_rate, jitter_us: 0 }).unwrap();
        let (tx, rx) = mpsc::channel();
        let sink = Arc::new(ChannelSink { clock: gpio.clock(), tx: Mutex::new(tx) });
        gpio.configure_output(TRIG_PIN).unwrap();
        gpio.configure_input_with_edge_interrupt(ECHO_PIN, sink).unwrap();
        (gpio, rx)
    }

    fn pulse_trigger(gpio: &SimGpio) {
        gpio.set_level(TRIG_PIN, Level::High).unwrap();
        gpio.set_level(TRIG_PIN, Level::Low).unwrap();
    }

    #[test]
    fn test_trigger_produces_echo_of_target_width() {
        let (gpio, rx) = armed_board(TargetScenario::Fixed { cm: 34.3 }, 0.0);
        let before = gpio.monotonic_micros();
        pulse_trigger(&gpio);

        let (first, rise_us) = rx.recv_timeout(EDGE_WAIT).unwrap();
        let (second, fall_us) = rx.recv_timeout(EDGE_WAIT).unwrap();
        assert_eq!((first, second), (Edge::Rising, Edge::Falling));
        assert!(rise_us >= before + BURST_DELAY_US);

        // Spin sleeping never wakes early; allow slack for a busy host
        let width = fall_us - rise_us;
        assert!((2000..10_000).contains(&width), "echo width {} us", width);
    }

    #[test]
    fn test_far_target_echoes_no_obstacle_pulse() {
        let (gpio, rx) = armed_board(TargetScenario::Fixed { cm: 650.0 }, 0.0);
        pulse_trigger(&gpio);

        let (_, rise_us) = rx.recv_timeout(EDGE_WAIT).unwrap();
        let (edge, fall_us) = rx.recv_timeout(EDGE_WAIT).unwrap();
        assert_eq!(edge, Edge::Falling);
        assert!(fall_us - rise_us >= NO_OBSTACLE_PULSE_US);
    }

    #[test]
    fn test_lost_echo_only_raises_rising_edge() {
        let (gpio, rx) = armed_board(TargetScenario::Fixed { cm: 34.3 }, 1.0);
        pulse_trigger(&gpio);

        assert_eq!(rx.recv_timeout(EDGE_WAIT).unwrap().0, Edge::Rising);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        // The next trigger still gets its rising edge
        pulse_trigger(&gpio);
        assert_eq!(rx.recv_timeout(EDGE_WAIT).unwrap().0, Edge::Rising);
    }

    #[test]
    fn test_sim_requires_configured_trigger() {
        let model = SensorModel { scenario: TargetScenario::Fixed { cm: 50.0 }, echo_loss_rate: 0.0, jitter_us: 0 };
        let gpio = SimGpio::start(model).unwrap();
        assert_eq!(gpio.set_level(TRIG_PIN, Level::High), Err(PlatformError::PinNotOutput(TRIG_PIN)));
        gpio.configure_output(TRIG_PIN).unwrap();
        gpio.set_level(TRIG_PIN, Level::High).unwrap();
        gpio.set_level(TRIG_PIN, Level::Low).unwrap();
    }
}
