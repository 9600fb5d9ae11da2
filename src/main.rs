use std::{sync::Arc, time::Duration};

use aurus_sonar::blackboard::{Blackboard, snapshot};
use aurus_sonar::bus::Topic;
use aurus_sonar::config::{self, DEFAULT_CONFIG_PATH, SonarConfig};
use aurus_sonar::display::{Frame, FrameBuffer};
use aurus_sonar::graphics;
use aurus_sonar::platform::Gpio;
use aurus_sonar::platform::sim::SimGpio;
use aurus_sonar::sync::SonarContext;
use aurus_sonar::tasks::run_pipeline;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

fn main() -> anyhow::Result<()> {
    let cfg = config::load_config(DEFAULT_CONFIG_PATH)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.level)))
        .init();

    info!(?cfg, "Aurus Sonar started.");

    let frames: Topic<Frame> = Topic::new(8);
    let tokio_rt = tokio::runtime::Runtime::new()?;

    if !cfg.display.window {
        info!("Running headless; panel text goes to the log.");
        return tokio_rt.block_on(async move {
            tokio::spawn(graphics::run_console_viewer(frames.subscribe()));
            run(cfg, frames).await
        });
    }

    let frame_rx_for_vis = frames.subscribe();
    tokio_rt.spawn(async move {
        match run(cfg, frames).await {
            Ok(_) => info!("Sonar pipeline finished."),
            Err(e) => error!("Sonar pipeline failed: {:?}. The panel will stop updating.", e),
        }
    });

    macroquad::Window::from_config(graphics::window_conf(), async move {
        // Keep the runtime alive for as long as the window is open
        let _tokio_rt = tokio_rt;
        graphics::run_viewer(frame_rx_for_vis).await;
    });
    Ok(())
}

async fn run(cfg: SonarConfig, frames: Topic<Frame>) -> anyhow::Result<()> {
    let ctx = SonarContext::new();
    let gpio: Arc<dyn Gpio> = Arc::new(SimGpio::start(cfg.simulation.sensor_model())?);
    let surface = FrameBuffer::with_topic(frames);
    let pipeline = run_pipeline(gpio, surface, ctx.clone(), cfg.display.pacing);

    match cfg.run_for_ms {
        Some(ms) => {
            tokio::select! {
                res = pipeline => res?,
                _ = tokio::time::sleep(Duration::from_millis(ms)) => info!(ms, "Run duration elapsed."),
            }
        }
        None => pipeline.await?,
    }

    report(&ctx.bb);
    Ok(())
}

fn report(bb: &Blackboard) {
    let s = snapshot(bb);
    info!(
        emitted = s.emitted,
        out_of_range = s.out_of_range,
        missing_start = s.missing_start,
        missing_end = s.missing_end,
        inverted = s.inverted,
        distance_queue_full = s.distance_queue_full,
        watchdog_rearms = s.watchdog_rearms,
        frames = s.frames,
        no_signal_frames = s.no_signal_frames,
        last_distance = ?s.last_distance,
        since_last_emit = ?s.last_emit_ts.map(|t| t.elapsed()),
        "Sonar summary"
    );
    for fault in &s.faults {
        warn!(fault = %fault, "Fault raised during run");
    }
}
