//! In-memory render surface
//!
//! Stands in for a platform canvas in headless use and tests: every presented
//! frame is copied and counted.

use crate::buffer::PixelBuffer;
use crate::source::RenderSurface;

/// Surface that keeps a copy of the last presented frame
#[derive(Debug, Default)]
pub struct CapturingSurface {
    last_frame: Option<PixelBuffer>,
    presented: u64,
    completed: u64,
}

impl CapturingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last frame handed to `present`
    pub fn last_frame(&self) -> Option<&PixelBuffer> {
        self.last_frame.as_ref()
    }

    /// Number of `present` calls
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Number of `on_frame_complete` calls
    pub fn completed(&self) -> u64 {
        self.completed
    }
}

impl RenderSurface for CapturingSurface {
    fn present(&mut self, buffer: &PixelBuffer) {
        match &mut self.last_frame {
            Some(frame) if frame.dimensions() == buffer.dimensions() => {
                frame.copy_from_slice(buffer);
            }
            _ => self.last_frame = Some(buffer.clone()),
        }
        self.presented += 1;
    }

    fn on_frame_complete(&mut self) {
        self.completed += 1;
    }
}
