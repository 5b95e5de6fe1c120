//! Viewport over the scene
//!
//! The viewport owns the fixed-size output buffer and the scene rectangle it
//! shows. Its zoom is a ratio: 1.0 maps one buffer pixel to one scene pixel,
//! larger values show more scene per pixel.

use bigview_cache::{Cache, CacheFrame, ViewportProbe};
use bigview_render::{
    blit_region, PixelBuffer, Point, PointF, Rect, RenderSurface, SampleSource, Size,
};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Which buffer a frame was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// Full-resolution cache window
    Cache,
    /// Low-resolution sample fallback
    Sample,
}

struct ViewState {
    buffer: PixelBuffer,
    rect: Rect,
    zoom: f32,
}

/// Visible window into the scene plus its output buffer
///
/// All geometry changes happen under one lock, so readers always see a
/// consistent rectangle and zoom.
///
/// # Example
///
/// ```
/// use bigview_core::Viewport;
/// use bigview_render::{PointF, Rect, Size};
///
/// let viewport = Viewport::new(Size::new(4000, 3000), Size::new(800, 600), 50);
/// viewport.zoom(0.5, PointF::new(400.0, 300.0));
/// assert_eq!(viewport.rect(), Rect::new(200, 150, 600, 450));
/// ```
pub struct Viewport {
    scene: Size,
    min_pixels_in_view: u32,
    state: Mutex<ViewState>,
}

impl Viewport {
    /// Viewport at the scene origin with an `output`-sized buffer and zoom 1.0
    pub fn new(scene: Size, output: Size, min_pixels_in_view: u32) -> Self {
        Self {
            scene,
            min_pixels_in_view,
            state: Mutex::new(ViewState {
                buffer: PixelBuffer::new(output.width, output.height),
                rect: output.to_rect(),
                zoom: 1.0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scene_size(&self) -> Size {
        self.scene
    }

    /// Scene rectangle currently shown
    pub fn rect(&self) -> Rect {
        self.lock().rect
    }

    pub fn origin(&self) -> Point {
        self.lock().rect.origin()
    }

    /// Extent of the shown rectangle in scene pixels
    pub fn size(&self) -> Size {
        self.lock().rect.size()
    }

    /// Output buffer dimensions
    pub fn physical_size(&self) -> Size {
        let state = self.lock();
        Size::new(state.buffer.width(), state.buffer.height())
    }

    pub fn zoom_factor(&self) -> f32 {
        self.lock().zoom
    }

    /// Move the rectangle to `(x, y)`, clamped inside the scene
    ///
    /// When the rectangle is larger than the scene the origin stays at zero.
    pub fn set_origin(&self, x: i32, y: i32) {
        let mut state = self.lock();
        state.rect = self.clamped(state.rect, x, y);
    }

    fn clamped(&self, rect: Rect, x: i32, y: i32) -> Rect {
        let (w, h) = (rect.width(), rect.height());
        let x = x.min(self.scene.width as i32 - w).max(0);
        let y = y.min(self.scene.height as i32 - h).max(0);
        Rect::new(x, y, x + w, y + h)
    }

    /// Reallocate the output buffer to `width` x `height`
    ///
    /// The origin is kept and the rectangle takes the new size as is; the
    /// next `set_origin` brings it back inside the scene.
    pub fn set_size(&self, width: u32, height: u32) {
        let mut state = self.lock();
        state.buffer = PixelBuffer::new(width, height);
        let origin = state.rect.origin();
        state.rect = Rect::from_xywh(origin.x, origin.y, width, height);
    }

    /// Pan by a screen-space drag of `(dx, dy)` buffer pixels
    ///
    /// Dragging right moves the content right, so the rectangle moves left.
    pub fn pan(&self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let mut state = self.lock();
        let origin = state.rect.origin();
        let x = origin.x.saturating_sub((dx * state.zoom).round() as i32);
        let y = origin.y.saturating_sub((dy * state.zoom).round() as i32);
        state.rect = self.clamped(state.rect, x, y);
    }

    /// Scale the view by `factor` around `focus`, a point in buffer pixels
    ///
    /// Values above 1.0 zoom out. The scene point under `focus` stays under
    /// it unless the new rectangle has to be shifted back inside the scene.
    /// Extents are clamped to `[min_pixels_in_view, scene]`, width first,
    /// then height, keeping the output aspect ratio.
    pub fn zoom(&self, factor: f32, focus: PointF) {
        if factor == 1.0 || !factor.is_finite() || factor <= 0.0 {
            return;
        }

        let mut state = self.lock();
        let screen_w = state.buffer.width() as f32;
        let screen_h = state.buffer.height() as f32;
        if screen_w == 0.0 || screen_h == 0.0 {
            return;
        }

        let scene_w = self.scene.width as f32;
        let scene_h = self.scene.height as f32;
        let min = self.min_pixels_in_view as f32;

        let current = state.rect;
        let rel_x = focus.x / screen_w;
        let rel_y = focus.y / screen_h;
        let scene_focus = PointF::new(
            current.left as f32 + rel_x * current.width() as f32,
            current.top as f32 + rel_y * current.height() as f32,
        );

        let mut width = (screen_w * state.zoom * factor).clamp(min.min(scene_w), scene_w);
        let mut height = width * screen_h / screen_w;
        if height > scene_h {
            height = scene_h;
            width = height * screen_w / screen_h;
        }
        if height < min {
            height = min;
            width = height * screen_w / screen_h;
        }

        // Degenerate aspect ratios can push width back out of range.
        let width = width.round().clamp(min.min(scene_w), scene_w) as i32;
        let height = height.round().clamp(min.min(scene_h), scene_h) as i32;

        let left = (scene_focus.x - rel_x * width as f32).round() as i32;
        let top = (scene_focus.y - rel_y * height as f32).round() as i32;
        let rect = self.clamped(Rect::new(0, 0, width, height), left, top);

        let zoom = width as f32 / screen_w;
        tracing::trace!(factor, zoom, from = %current, to = %rect, "viewport zoom");
        state.rect = rect;
        state.zoom = zoom;
    }

    /// Render one frame into the output buffer and hand it to `surface`
    ///
    /// Asks the cache first; the sample is drawn whenever the cache has no
    /// window covering the current rectangle. Output pixels past the scene
    /// edge are cleared. A viewport without an output buffer never requests
    /// a refill.
    pub fn draw(
        &self,
        cache: &Cache,
        sample: &dyn SampleSource,
        surface: &mut dyn RenderSurface,
    ) -> FrameSource {
        let (rect, blank) = {
            let state = self.lock();
            (state.rect, state.buffer.width() == 0 || state.buffer.height() == 0)
        };
        let frame = if blank {
            CacheFrame::Sample
        } else {
            cache.update(rect)
        };

        let mut state = self.lock();
        let rect = state.rect;
        let visible = rect.intersect(&self.scene.to_rect());
        if visible != Some(rect) {
            state.buffer.fill(0);
        }
        let visible = visible.unwrap_or(rect);

        let source = match frame {
            CacheFrame::Cached { buffer, window } if window.contains_rect(&visible) => {
                let src = rect.offset(-window.left, -window.top);
                blit_region(&buffer, src, &mut state.buffer);
                FrameSource::Cache
            }
            CacheFrame::Cached { .. } | CacheFrame::Sample => {
                sample.render(&mut state.buffer, rect);
                FrameSource::Sample
            }
        };

        surface.present(&state.buffer);
        surface.on_frame_complete();
        source
    }
}

impl ViewportProbe for Viewport {
    fn viewport_rect(&self) -> Rect {
        self.rect()
    }
}

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Viewport")
            .field("scene", &self.scene)
            .field("rect", &state.rect)
            .field("zoom", &state.zoom)
            .finish()
    }
}
