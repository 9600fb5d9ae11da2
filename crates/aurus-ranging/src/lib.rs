#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for pulse-echo ultrasonic ranging."]
#![doc = ""]
#![doc = "This crate converts the width of an echo pulse into a distance sample,"]
#![doc = "classifies it against the sensor's plausible range, and sizes the bar graph."]

use core::fmt;
use libm::{floorf, round};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::RangingError;

/// Speed of sound in centimetres per microsecond (≈ 343 m/s).
pub const SPEED_OF_SOUND_CM_PER_US: f64 = 0.0343;

/// Closest distance the sensor reports reliably (cm).
pub const MIN_RANGE_CM: f32 = 2.0;

/// Farthest distance the sensor reports reliably (cm).
pub const MAX_RANGE_CM: f32 = 400.0;

/// Longest bar the display draws (px).
pub const BAR_MAX_PX: u32 = 112;

/// A pair of echo edge timestamps, in microseconds since boot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoPulse {
    /// Rising edge of the echo pin.
    pub start_us: u64,
    /// Falling edge of the echo pin.
    pub end_us: u64,
}

impl EchoPulse {
    /// Construct a pulse from its two edge timestamps.
    pub const fn new(start_us: u64, end_us: u64) -> Self {
        EchoPulse { start_us, end_us }
    }

    /// Width of the pulse in microseconds.
    ///
    /// # Errors
    ///
    /// Returns `Err(RangingError::NonIncreasingTimestamps)` if the falling edge
    /// does not come strictly after the rising edge.
    pub fn width_us(&self) -> Result<u64, RangingError> {
        if self.end_us > self.start_us {
            Ok(self.end_us - self.start_us)
        } else {
            Err(RangingError::NonIncreasingTimestamps {
                start_us: self.start_us,
                end_us: self.end_us,
            })
        }
    }
}

/// One distance reading in centimetres.
///
/// Readings outside `[MIN_RANGE_CM, MAX_RANGE_CM]` are stored as the sentinel
/// [`DistanceSample::OUT_OF_RANGE`], which travels through the queues like any
/// other value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample(f32);

impl DistanceSample {
    /// Sentinel for a measurement outside the sensor's valid range.
    pub const OUT_OF_RANGE: DistanceSample = DistanceSample(-1.0);

    /// Wrap a raw centimetre value without classification.
    pub const fn from_cm(cm: f32) -> Self {
        DistanceSample(cm)
    }

    /// Convert an echo pulse into a distance sample.
    ///
    /// The pulse covers the round trip, so the distance is
    /// `width * SPEED_OF_SOUND_CM_PER_US / 2`. Anything below `MIN_RANGE_CM`
    /// or above `MAX_RANGE_CM` becomes [`DistanceSample::OUT_OF_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns `Err(RangingError::NonIncreasingTimestamps)` if `end_us <= start_us`.
    pub fn from_pulse(pulse: EchoPulse) -> Result<Self, RangingError> {
        let width = pulse.width_us()?;
        let cm = (width as f64 * SPEED_OF_SOUND_CM_PER_US / 2.0) as f32;

        if cm > MAX_RANGE_CM || cm < MIN_RANGE_CM {
            Ok(DistanceSample::OUT_OF_RANGE)
        } else {
            Ok(DistanceSample(cm))
        }
    }

    /// The raw value in centimetres (`-1.0` for the sentinel).
    pub fn cm(&self) -> f32 {
        self.0
    }

    /// True when the value lies within `[MIN_RANGE_CM, MAX_RANGE_CM]`.
    pub fn is_in_range(&self) -> bool {
        self.0 >= MIN_RANGE_CM && self.0 <= MAX_RANGE_CM
    }

    /// Length of the bar graph for this sample: `floor(cm)` clamped to `[0, max_px]`.
    pub fn bar_length_px(&self, max_px: u32) -> u32 {
        let floored = floorf(self.0);
        if floored <= 0.0 {
            0
        } else if floored >= max_px as f32 {
            max_px
        } else {
            floored as u32
        }
    }
}

impl fmt::Display for DistanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_in_range() {
            write!(f, "{:.2} cm", self.0)
        } else {
            write!(f, "out of range")
        }
    }
}

/// Echo pulse width (µs) a sensor produces for an obstacle at `distance_cm`.
///
/// Inverse of [`DistanceSample::from_pulse`]; negative distances yield zero.
pub fn pulse_width_for(distance_cm: f32) -> u64 {
    if distance_cm <= 0.0 {
        return 0;
    }
    round(distance_cm as f64 * 2.0 / SPEED_OF_SOUND_CM_PER_US) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f32 = 1e-3;

    #[test]
    fn test_valid_pulse_distance() {
        let sample = DistanceSample::from_pulse(EchoPulse::new(1000, 3000)).unwrap();
        assert!((sample.cm() - 34.3).abs() < EPSILON);
        assert!(sample.is_in_range());
        assert_eq!(sample.bar_length_px(BAR_MAX_PX), 34);
    }

    #[test]
    fn test_short_pulse_is_out_of_range() {
        // 50 us -> 0.8575 cm, below the minimum
        let sample = DistanceSample::from_pulse(EchoPulse::new(1000, 1050)).unwrap();
        assert_eq!(sample, DistanceSample::OUT_OF_RANGE);
        assert!(!sample.is_in_range());
    }

    #[test]
    fn test_long_pulse_is_out_of_range() {
        // 38 ms is what the sensor reports with no obstacle in front of it
        let sample = DistanceSample::from_pulse(EchoPulse::new(0, 38_000)).unwrap();
        assert_eq!(sample, DistanceSample::OUT_OF_RANGE);
    }

    #[test]
    fn test_non_increasing_timestamps() {
        let inverted = DistanceSample::from_pulse(EchoPulse::new(3000, 1000));
        assert_eq!(
            inverted,
            Err(RangingError::NonIncreasingTimestamps { start_us: 3000, end_us: 1000 })
        );
        let equal = DistanceSample::from_pulse(EchoPulse::new(5000, 5000));
        assert!(matches!(equal, Err(RangingError::NonIncreasingTimestamps { .. })));
    }

    #[test]
    fn test_distance_formula_across_range() {
        for width in [117u64, 500, 2915, 10_000, 23_000] {
            let expected = (width as f64 * SPEED_OF_SOUND_CM_PER_US / 2.0) as f32;
            let sample = DistanceSample::from_pulse(EchoPulse::new(10, 10 + width)).unwrap();
            assert!(sample.is_in_range(), "width {} should be in range", width);
            assert!((sample.cm() - expected).abs() < EPSILON);
        }
    }

    #[test]
    fn test_range_boundaries_are_inclusive() {
        assert!(DistanceSample::from_cm(2.0).is_in_range());
        assert!(DistanceSample::from_cm(400.0).is_in_range());
        assert!(!DistanceSample::from_cm(1.99).is_in_range());
        assert!(!DistanceSample::from_cm(400.01).is_in_range());
    }

    #[test]
    fn test_bar_length_clamps() {
        assert_eq!(DistanceSample::from_cm(150.0).bar_length_px(BAR_MAX_PX), 112);
        assert_eq!(DistanceSample::from_cm(112.9).bar_length_px(BAR_MAX_PX), 112);
        assert_eq!(DistanceSample::from_cm(111.9).bar_length_px(BAR_MAX_PX), 111);
        assert_eq!(DistanceSample::OUT_OF_RANGE.bar_length_px(BAR_MAX_PX), 0);
        assert_eq!(DistanceSample::from_cm(0.5).bar_length_px(BAR_MAX_PX), 0);
    }

    #[test]
    fn test_pulse_width_inverse() {
        let width = pulse_width_for(34.3);
        assert_eq!(width, 2000);
        let back = DistanceSample::from_pulse(EchoPulse::new(0, width)).unwrap();
        assert!((back.cm() - 34.3).abs() < EPSILON);
        assert_eq!(pulse_width_for(-1.0), 0);
    }
}
