//! Pulse-echo ultrasonic range finder.
//!
//! Interrupt-driven edge timestamping feeds an echo task through a bounded
//! queue; distances flow on to an OLED display task. A binary semaphore
//! throttles the trigger to one pulse per completed (or timed-out) echo.

pub mod blackboard;
pub mod bus;
pub mod config;
pub mod display;
pub mod graphics;
pub mod platform;
pub mod sync;
pub mod tasks;
