//! Display surface seam and an in-memory OLED frame buffer.
//!
//! [`DisplaySurface`] is the whole contract the display task needs. Pixel
//! rendering and transport live behind it; [`FrameBuffer`] records draw calls
//! and, on `present`, publishes the finished [`Frame`] to any viewer.

use tracing::{debug, trace};

use crate::bus::Topic;

/// Logical size of the OLED panel.
pub const DISPLAY_WIDTH: i32 = 128;
pub const DISPLAY_HEIGHT: i32 = 32;

/// Drawing operations of a monochrome text/line display.
pub trait DisplaySurface: Send {
    fn init(&mut self);
    fn clear_buffer(&mut self);
    fn draw_string(&mut self, x: i32, y: i32, scale: u8, text: &str);
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32);
    /// Push the buffer to the panel.
    fn present(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    Text { x: i32, y: i32, scale: u8, text: String },
    Line { x0: i32, y0: i32, x1: i32, y1: i32 },
}

/// Contents of one presented buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub seq: u64,
    pub ops: Vec<DrawOp>,
}

impl Frame {
    /// All text on the frame, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                DrawOp::Line { .. } => None,
            })
            .collect()
    }

    /// All lines on the frame as `(x0, y0, x1, y1)`.
    pub fn lines(&self) -> Vec<(i32, i32, i32, i32)> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                DrawOp::Line { x0, y0, x1, y1 } => Some((x0, y0, x1, y1)),
                DrawOp::Text { .. } => None,
            })
            .collect()
    }
}

/// Records draw calls into a back buffer; `present` swaps it to the front.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    initialized: bool,
    back: Vec<DrawOp>,
    front: Frame,
    frames: Option<Topic<Frame>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish every presented frame on `frames`.
    pub fn with_topic(frames: Topic<Frame>) -> Self {
        Self { frames: Some(frames), ..Self::default() }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The last presented frame.
    pub fn front(&self) -> &Frame {
        &self.front
    }

    /// Draw calls made since the last `present`.
    pub fn pending(&self) -> &[DrawOp] {
        &self.back
    }
}

impl DisplaySurface for FrameBuffer {
    fn init(&mut self) {
        self.initialized = true;
        self.back.clear();
        self.front = Frame::default();
        debug!(width = DISPLAY_WIDTH, height = DISPLAY_HEIGHT, "Frame buffer initialized");
    }

    fn clear_buffer(&mut self) {
        self.back.clear();
    }

    fn draw_string(&mut self, x: i32, y: i32, scale: u8, text: &str) {
        self.back.push(DrawOp::Text { x, y, scale, text: text.to_string() });
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        self.back.push(DrawOp::Line { x0, y0, x1, y1 });
    }

    fn present(&mut self) {
        self.front = Frame { seq: self.front.seq + 1, ops: self.back.clone() };
        trace!(seq = self.front.seq, texts = ?self.front.texts(), "Frame presented");
        if let Some(frames) = &self.frames {
            frames.publish(self.front.clone());
        }
    }
}
