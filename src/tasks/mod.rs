//! The three sonar tasks and the echo pin interrupt handler.
//!
//! Trigger fires the sensor, the interrupt timestamps both echo edges into the
//! time queue, echo turns each pair into a distance sample and signals the
//! cycle semaphore, and display renders whatever reaches the distance queue.

pub mod display;
pub mod echo;
pub mod edge_capture;
pub mod trigger;

use std::sync::Arc;
use tracing::info;

use crate::display::DisplaySurface;
use crate::platform::Gpio;
use crate::sync::SonarContext;

pub use display::{DisplayPacing, display_task};
pub use echo::echo_task;
pub use edge_capture::EdgeCapture;
pub use trigger::trigger_task;

/// Run all three tasks until one of them fails.
///
/// The echo task is polled first so the edge interrupt is registered before
/// the first trigger pulse goes out.
pub async fn run_pipeline<D: DisplaySurface>(
    gpio: Arc<dyn Gpio>,
    surface: D,
    ctx: Arc<SonarContext>,
    pacing: DisplayPacing,
) -> anyhow::Result<()> {
    info!(?pacing, "Sonar pipeline starting.");
    tokio::try_join!(
        echo_task(gpio.clone(), ctx.clone()),
        trigger_task(gpio, ctx.clone()),
        display_task(surface, ctx, pacing),
    )?;
    Ok(())
}
