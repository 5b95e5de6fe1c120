//! Collaborator interfaces around the cache
//!
//! The cache never decodes pixels itself. It asks a [`RegionLoader`] for the
//! full-resolution pixels of a window, falls back to a [`SampleSource`] while
//! no window is ready, and hands finished frames to a [`RenderSurface`].

use crate::buffer::PixelBuffer;
use crate::geometry::Rect;
use bigview_scheduler::CancellationToken;

/// Why a region load produced no pixels
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The buffer for the region could not be allocated
    ///
    /// Recoverable: the cache shrinks its memory budget and retries with a
    /// smaller window.
    #[error("allocation of {bytes} bytes for region failed")]
    AllocationFailure { bytes: u64 },

    /// The pass was cancelled before the loader finished
    #[error("region load cancelled")]
    Cancelled,

    /// Any other loader failure (I/O, decode)
    #[error("region load failed: {0}")]
    Region(String),
}

impl LoadError {
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, LoadError::AllocationFailure { .. })
    }
}

/// Expensive full-resolution loader
///
/// Called only from the cache worker thread and never concurrently with
/// itself. May take seconds. Must accept any rectangle within scene bounds
/// and return a buffer whose dimensions equal the rectangle's.
pub trait RegionLoader: Send {
    fn load(&mut self, rect: Rect, cancel: &CancellationToken) -> Result<PixelBuffer, LoadError>;
}

impl<F> RegionLoader for F
where
    F: FnMut(Rect, &CancellationToken) -> Result<PixelBuffer, LoadError> + Send,
{
    fn load(&mut self, rect: Rect, cancel: &CancellationToken) -> Result<PixelBuffer, LoadError> {
        self(rect, cancel)
    }
}

/// Cheap whole-scene fallback
///
/// Called from the render path; must finish well within a frame and never
/// perform loader-style I/O.
pub trait SampleSource: Send + Sync {
    /// Fill all of `target` with the part of the scene covered by `scene_rect`
    fn render(&self, target: &mut PixelBuffer, scene_rect: Rect);
}

/// Sink for finished viewport frames
pub trait RenderSurface {
    fn present(&mut self, buffer: &PixelBuffer);

    /// Called after `present`, for overlays and bookkeeping
    fn on_frame_complete(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::try_allocate;

    #[test]
    fn test_closure_is_region_loader() {
        let mut calls = 0;
        let mut loader = |rect: Rect, _cancel: &CancellationToken| {
            calls += 1;
            try_allocate(rect.size())
        };

        let buffer = RegionLoader::load(&mut loader, Rect::new(0, 0, 10, 5), &CancellationToken::new())
            .unwrap();
        assert_eq!(buffer.dimensions(), (10, 5));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_load_error_classification() {
        assert!(LoadError::AllocationFailure { bytes: 1 }.is_allocation_failure());
        assert!(!LoadError::Cancelled.is_allocation_failure());
        assert!(!LoadError::Region("eof".into()).is_allocation_failure());
    }

    #[test]
    fn test_load_error_messages() {
        assert_eq!(
            LoadError::AllocationFailure { bytes: 1024 }.to_string(),
            "allocation of 1024 bytes for region failed"
        );
        assert_eq!(
            LoadError::Region("truncated".into()).to_string(),
            "region load failed: truncated"
        );
    }
}
