use macroquad::prelude::*;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, DrawOp, Frame};

// Host pixels per OLED pixel
const VIS_SCALE: f32 = 4.0;
// Glyph height of the panel font at scale 1
const GLYPH_PX: f32 = 8.0;
const PIXEL_ON: Color = Color::new(0.55, 0.85, 1.0, 1.0);

pub fn window_conf() -> Conf {
    Conf {
        window_title: "Aurus Sonar OLED".to_string(),
        window_width: (DISPLAY_WIDTH as f32 * VIS_SCALE) as i32,
        window_height: (DISPLAY_HEIGHT as f32 * VIS_SCALE) as i32,
        high_dpi: true,
        window_resizable: false,
        ..Default::default()
    }
}

/// Draws the most recent presented frame every host frame until the frame
/// topic closes.
pub async fn run_viewer(mut frame_rx: broadcast::Receiver<Arc<Frame>>) {
    let mut current = Arc::new(Frame::default());

    info!("OLED viewer loop starting...");

    loop {
        match frame_rx.try_recv() {
            Ok(frame) => current = frame,
            Err(broadcast::error::TryRecvError::Empty) => {}
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "OLED viewer lagged behind the display task.");
                while let Err(broadcast::error::TryRecvError::Lagged(_)) = frame_rx.try_recv() {}
                if let Ok(frame) = frame_rx.try_recv() {
                    current = frame;
                }
            }
            Err(broadcast::error::TryRecvError::Closed) => {
                error!("Frame channel closed. Exiting OLED viewer.");
                break;
            }
        }

        clear_background(BLACK);
        for op in &current.ops {
            match op {
                DrawOp::Text { x, y, scale, text } => {
                    let size = GLYPH_PX * *scale as f32 * VIS_SCALE;
                    draw_text(text, *x as f32 * VIS_SCALE, *y as f32 * VIS_SCALE + size, size, PIXEL_ON);
                }
                DrawOp::Line { x0, y0, x1, y1 } => {
                    draw_line(
                        *x0 as f32 * VIS_SCALE,
                        *y0 as f32 * VIS_SCALE,
                        *x1 as f32 * VIS_SCALE,
                        *y1 as f32 * VIS_SCALE,
                        VIS_SCALE,
                        PIXEL_ON,
                    );
                }
            }
        }

        next_frame().await
    }
}

/// Headless stand-in for the window: logs the panel text whenever it changes.
pub async fn run_console_viewer(mut frame_rx: broadcast::Receiver<Arc<Frame>>) {
    let mut last_texts: Vec<String> = Vec::new();

    loop {
        match frame_rx.recv().await {
            Ok(frame) => {
                let texts: Vec<String> = frame.texts().into_iter().map(str::to_string).collect();
                if texts != last_texts {
                    info!(seq = frame.seq, panel = ?texts, "OLED");
                    last_texts = texts;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Console viewer lagged behind the display task.");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Frame channel closed. Exiting console viewer.");
                break;
            }
        }
    }
}
