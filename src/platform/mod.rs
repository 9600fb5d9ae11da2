//! Platform capability seams.
//!
//! The sonar pipeline only needs pin direction/level control, a monotonic
//! microsecond clock, and an edge interrupt that calls back into an
//! [`EdgeSink`]. Real boards, the host simulator ([`sim`]) and the test
//! double ([`mock`]) all plug in behind the [`Gpio`] trait.

pub mod mock;
pub mod sim;

use std::fmt;
use std::sync::Arc;

/// Trigger pin driving the sensor's ranging cycle.
pub const TRIG_PIN: Pin = Pin(6);
/// Echo pin whose high time is the round-trip travel time.
pub const ECHO_PIN: Pin = Pin(7);

/// A GPIO pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pin(pub u8);

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GP{}", self.0)
    }
}

/// Logic level of an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Which transition raised the edge interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Errors raised by a platform implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// `set_level` on a pin that was never configured as an output.
    PinNotOutput(Pin),
    /// The pin already has an edge interrupt or a different direction.
    PinAlreadyClaimed(Pin),
    /// The backing hardware (or simulator thread) is gone.
    Disconnected(&'static str),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::PinNotOutput(pin) => write!(f, "Pin {} is not an output", pin),
            PlatformError::PinAlreadyClaimed(pin) => write!(f, "Pin {} is already claimed", pin),
            PlatformError::Disconnected(what) => write!(f, "Platform disconnected: {}", what),
        }
    }
}

impl std::error::Error for PlatformError {}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Microseconds since boot. Never goes backwards.
pub trait MonotonicClock: Send + Sync {
    fn monotonic_micros(&self) -> u64;
}

/// Receiver of edge interrupts.
///
/// Runs in interrupt context: implementations must not block.
pub trait EdgeSink: Send + Sync {
    fn on_edge(&self, edge: Edge);
}

/// GPIO and timer capability the tasks are written against.
pub trait Gpio: Send + Sync {
    /// Configure `pin` as a push-pull output, driven low.
    fn configure_output(&self, pin: Pin) -> Result<()>;

    /// Configure `pin` as an input and call `sink` on both rising and falling edges.
    fn configure_input_with_edge_interrupt(&self, pin: Pin, sink: Arc<dyn EdgeSink>) -> Result<()>;

    /// Drive an output pin.
    fn set_level(&self, pin: Pin, level: Level) -> Result<()>;

    /// Shared handle to the platform's monotonic clock.
    fn clock(&self) -> Arc<dyn MonotonicClock>;

    fn monotonic_micros(&self) -> u64 {
        self.clock().monotonic_micros()
    }
}
