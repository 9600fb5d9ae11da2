#![warn(missing_docs)]

//! Error types for the ranging library.
//!
//! This module defines the errors that can occur while turning a pair of
//! echo edge timestamps into a distance sample.

use core::fmt;

/// Errors that can occur in ranging calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingError {
    /// The falling edge did not come after the rising edge.
    /// Returned when `end_us <= start_us`; the cycle carries no usable pulse.
    NonIncreasingTimestamps {
        /// Rising edge timestamp (µs since boot).
        start_us: u64,
        /// Falling edge timestamp (µs since boot).
        end_us: u64,
    },
}

impl fmt::Display for RangingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangingError::NonIncreasingTimestamps { start_us, end_us } => write!(
                f,
                "Non-increasing echo timestamps: start {} us, end {} us",
                start_us, end_us
            ),
        }
    }
}

impl core::error::Error for RangingError {}
