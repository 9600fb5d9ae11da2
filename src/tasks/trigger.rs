use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info};

use crate::blackboard::record_watchdog;
use crate::platform::{Gpio, Level, TRIG_PIN};
use crate::sync::SonarContext;

/// Longest wait for the echo task's completion signal before re-arming anyway.
pub const TRIGGER_WATCHDOG: Duration = Duration::from_millis(200);
/// High time of the trigger pulse.
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);
/// Settle time after each pulse.
pub const TRIGGER_SETTLE: Duration = Duration::from_millis(100);

/// Drive the trigger pin high for [`TRIGGER_PULSE`], then low.
pub fn fire_trigger(gpio: &dyn Gpio) -> anyhow::Result<()> {
    gpio.set_level(TRIG_PIN, Level::High)?;
    spin_sleep::sleep(TRIGGER_PULSE);
    gpio.set_level(TRIG_PIN, Level::Low)?;
    Ok(())
}

/// One trigger iteration. Returns `false` when the watchdog fired instead of
/// the cycle semaphore.
pub async fn trigger_cycle(gpio: &dyn Gpio, ctx: &SonarContext) -> anyhow::Result<bool> {
    let signaled = ctx.cycle.take(TRIGGER_WATCHDOG).await;
    if !signaled {
        debug!(timeout = ?TRIGGER_WATCHDOG, "No echo completion, watchdog re-arming trigger");
        record_watchdog(&ctx.bb);
    }

    fire_trigger(gpio)?;
    time::sleep(TRIGGER_SETTLE).await;
    Ok(signaled)
}

pub async fn trigger_task(gpio: Arc<dyn Gpio>, ctx: Arc<SonarContext>) -> anyhow::Result<()> {
    gpio.configure_output(TRIG_PIN)?;
    info!(pin = %TRIG_PIN, "Trigger task started.");

    loop {
        trigger_cycle(gpio.as_ref(), &ctx).await?;
    }
}
