//! Cache window sizing
//!
//! The cache window is the viewport grown by a symmetric margin, as large as
//! the memory budget allows and clamped to the scene. A larger window means
//! more panning before the next refill.

use crate::memory_budget::MemoryBudget;
use bigview_render::{Rect, Size};
use std::sync::Arc;

/// Decides which scene rectangle the cache should hold
pub trait CacheWindowPolicy: Send + Sync {
    /// Window to load for `viewport`; must lie within `scene`
    fn compute_window(&self, viewport: Rect, scene: Size) -> Rect;

    /// The region loader could not allocate the last window
    fn on_allocation_failure(&self);

    /// Whether the policy has no memory left to spend on a window
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Grow a margin around `viewport` until it would exceed `budget_bytes`
///
/// Both margins grow by one pixel per step; the last margin whose area fits
/// is kept. Margins wider than the scene allows are trimmed, then split
/// evenly across both sides, with any overflow on one side moved to the
/// other. A zero margin returns the viewport itself.
///
/// # Example
///
/// ```
/// use bigview_cache::compute_window;
/// use bigview_render::{Rect, Size};
///
/// let viewport = Rect::new(0, 0, 800, 600);
/// let scene = Size::new(4000, 3000);
///
/// // Room for exactly a 100 pixel margin.
/// let budget = 900 * 700 * 4 + 1;
/// assert_eq!(compute_window(viewport, scene, budget, 4), Rect::new(0, 0, 900, 700));
/// ```
pub fn compute_window(viewport: Rect, scene: Size, budget_bytes: u64, bytes_per_pixel: u32) -> Rect {
    let vw = viewport.width().max(0) as u64;
    let vh = viewport.height().max(0) as u64;
    let scene_w = scene.width as u64;
    let scene_h = scene.height as u64;
    let bpp = bytes_per_pixel.max(1) as u64;

    // Past this margin both axes get trimmed anyway.
    let cap = scene_w.saturating_sub(vw).max(scene_h.saturating_sub(vh));

    let (mut tw, mut th) = (0u64, 0u64);
    let (mut mw, mut mh) = (tw, th);
    while mw < cap && (vw + tw).saturating_mul(vh + th).saturating_mul(bpp) < budget_bytes {
        mw = tw;
        mh = th;
        tw += 1;
        th += 1;
    }

    if vw + mw > scene_w {
        mw = scene_w.saturating_sub(vw);
    }
    if vh + mh > scene_h {
        mh = scene_h.saturating_sub(vh);
    }

    let (left, right) = spread(viewport.left, viewport.right, (mw >> 1) as i32, scene.width as i32);
    let (top, bottom) = spread(viewport.top, viewport.bottom, (mh >> 1) as i32, scene.height as i32);
    Rect::new(left, top, right, bottom)
}

/// Extend `[low, high)` by `half` on both sides, moving overflow inward
fn spread(low: i32, high: i32, half: i32, limit: i32) -> (i32, i32) {
    let mut low = low - half;
    let mut high = high + half;
    if low < 0 {
        high -= low;
        low = 0;
    }
    if high > limit {
        low -= high - limit;
        high = limit;
    }
    (low.max(0), high)
}

/// Margin policy spending a shared, shrinking [`MemoryBudget`]
#[derive(Debug, Clone)]
pub struct MarginWindowPolicy {
    budget: Arc<MemoryBudget>,
    bytes_per_pixel: u32,
}

impl MarginWindowPolicy {
    pub fn new(budget: Arc<MemoryBudget>, bytes_per_pixel: u32) -> Self {
        Self {
            budget,
            bytes_per_pixel,
        }
    }

    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }
}

impl CacheWindowPolicy for MarginWindowPolicy {
    fn compute_window(&self, viewport: Rect, scene: Size) -> Rect {
        compute_window(viewport, scene, self.budget.bytes(), self.bytes_per_pixel)
    }

    fn on_allocation_failure(&self) {
        let percent = self.budget.shrink();
        tracing::warn!(percent, "region allocation failed, cache budget reduced");
    }

    fn is_exhausted(&self) -> bool {
        self.budget.is_exhausted()
    }
}
