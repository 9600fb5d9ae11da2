use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info};

use aurus_ranging::{BAR_MAX_PX, DistanceSample};

use crate::blackboard::record_frame;
use crate::display::DisplaySurface;
use crate::sync::SonarContext;

/// Pacing wait at the top of each display iteration.
pub const DISPLAY_PERIOD: Duration = Duration::from_millis(100);
/// Wait for a distance sample before showing "no signal".
pub const DISTANCE_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause after each refresh.
pub const DISPLAY_SETTLE: Duration = Duration::from_millis(100);

pub const NO_SIGNAL_TEXT: &str = "Erro: Sem sinal";
pub const OUT_OF_RANGE_TEXT: &str = "Erro: out of range";

const TEXT_X: i32 = 0;
const TEXT_Y: i32 = 10;
const TEXT_SCALE: u8 = 1;
const BAR_Y: i32 = 27;

/// How the display loop is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPacing {
    /// Fixed wait per iteration; the cycle semaphore belongs to trigger and echo only.
    #[default]
    Independent,
    /// Also take the cycle semaphore each iteration, competing with the
    /// trigger task for the echo task's completion signal.
    SharedSemaphore,
}

/// Full refresh for a received sample: text line plus distance bar.
pub fn render_distance(surface: &mut dyn DisplaySurface, sample: DistanceSample) {
    surface.clear_buffer();
    if sample.is_in_range() {
        let text = format!("Distancia: {:.2}", sample.cm());
        surface.draw_string(TEXT_X, TEXT_Y, TEXT_SCALE, &text);
    } else {
        surface.draw_string(TEXT_X, TEXT_Y, TEXT_SCALE, OUT_OF_RANGE_TEXT);
    }

    let bar = sample.bar_length_px(BAR_MAX_PX) as i32;
    surface.draw_line(0, BAR_Y, bar, BAR_Y);
    surface.present();
}

/// Full refresh when no sample arrived in time.
pub fn render_no_signal(surface: &mut dyn DisplaySurface) {
    surface.clear_buffer();
    surface.draw_string(TEXT_X, TEXT_Y, TEXT_SCALE, NO_SIGNAL_TEXT);
    surface.present();
}

/// Read one sample (or time out) and redraw the whole screen.
pub async fn display_cycle(surface: &mut dyn DisplaySurface, ctx: &SonarContext) -> Option<DistanceSample> {
    let received = ctx.distance_rx.recv_timeout(DISTANCE_TIMEOUT).await;
    match received {
        Some(sample) => render_distance(surface, sample),
        None => render_no_signal(surface),
    }
    record_frame(&ctx.bb, received.is_none());
    received
}

impl DisplayPacing {
    /// Block for at most [`DISPLAY_PERIOD`] before the next refresh.
    async fn wait(self, ctx: &SonarContext) {
        match self {
            DisplayPacing::Independent => time::sleep(DISPLAY_PERIOD).await,
            DisplayPacing::SharedSemaphore => {
                // Timing out is fine; this is only a pacing gate
                ctx.cycle.take(DISPLAY_PERIOD).await;
            }
        }
    }
}

pub async fn display_task<D: DisplaySurface>(
    mut surface: D,
    ctx: Arc<SonarContext>,
    pacing: DisplayPacing,
) -> anyhow::Result<()> {
    surface.init();
    info!(?pacing, "Display task started.");

    loop {
        pacing.wait(&ctx).await;
        if let Some(sample) = display_cycle(&mut surface, &ctx).await {
            debug!(%sample, "Display refreshed");
        }
        time::sleep(DISPLAY_SETTLE).await;
    }
}
