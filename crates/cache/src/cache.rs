//! Cache state machine
//!
//! The [`Cache`] holds one full-resolution buffer covering a window around the
//! viewport. The render path calls [`Cache::update`] every frame; it never
//! blocks for longer than a state check and either hands back the buffer or
//! tells the caller to draw the sample. Refills happen on the worker thread
//! through the pass methods at the bottom of this file.
//!
//! All state and the window rectangle live behind one mutex. The region
//! loader is never called while it is held.

use crate::window::CacheWindowPolicy;
use bigview_render::{LoadError, PixelBuffer, Rect, Size};
use bigview_scheduler::{CancellationToken, WakeSignal};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where the cache is in its refill cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// Not yet armed by the owner
    Uninitialized,
    /// Armed, no refill requested
    Initialized,
    /// Refill requested, worker not yet started on it
    StartUpdate,
    /// Worker is loading a window
    InUpdate,
    /// Buffer holds the current window
    Ready,
    /// Refills paused by the owner
    Suspended,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheState::Uninitialized => "uninitialized",
            CacheState::Initialized => "initialized",
            CacheState::StartUpdate => "start-update",
            CacheState::InUpdate => "in-update",
            CacheState::Ready => "ready",
            CacheState::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

/// What the render path should draw from
#[derive(Debug, Clone)]
pub enum CacheFrame {
    /// Full-resolution pixels of `window`
    Cached {
        buffer: Arc<PixelBuffer>,
        window: Rect,
    },
    /// No usable buffer; draw the low-resolution sample
    Sample,
}

impl CacheFrame {
    pub fn is_cached(&self) -> bool {
        matches!(self, CacheFrame::Cached { .. })
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Updates answered with the cached buffer
    pub hits: u64,

    /// Updates answered with the sample
    pub misses: u64,

    /// Transitions into StartUpdate
    pub refills_requested: u64,

    /// Buffers made Ready
    pub loads_published: u64,

    /// Finished loads dropped because the pass was superseded
    pub loads_discarded: u64,

    /// Allocation failures reported by the region loader
    pub allocation_failures: u64,

    /// Other region loader failures
    pub load_errors: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Handle for one refill pass, held by the worker
#[derive(Debug)]
pub struct Pass {
    epoch: u64,
    cancel: CancellationToken,
}

impl Pass {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Token the region loader should poll
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// How a pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Buffer stored, cache Ready
    Published,
    /// Result dropped; the pass no longer matched the cache
    Superseded,
    /// Allocation failed; budget shrunk and a smaller refill is pending
    Retry,
    /// Allocation failed and no budget is left; sample only from now on
    Exhausted,
    /// Loader failed for another reason
    Failed,
}

struct Inner {
    state: CacheState,
    buffer: Option<Arc<PixelBuffer>>,
    window: Rect,
    /// Bumped whenever an in-flight pass stops being current
    epoch: u64,
    cancel: CancellationToken,
    /// Window whose load failed; no retry while the viewport stays inside it
    failed_window: Option<Rect>,
    stats: CacheStats,
}

impl Inner {
    fn transition(&mut self, to: CacheState) {
        if self.state != to {
            tracing::trace!(from = %self.state, to = %to, "cache state");
            self.state = to;
        }
    }

    /// Drop any in-flight pass: new epoch, cancel its token
    fn supersede(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.cancel.cancel();
    }

    fn is_current(&self, pass: &Pass) -> bool {
        self.state == CacheState::InUpdate && self.epoch == pass.epoch
    }
}

/// Full-resolution window cache shared by the render path and the worker
///
/// # Example
///
/// ```
/// use bigview_cache::{Cache, CacheFrame, CacheState, MarginWindowPolicy, MemoryBudget};
/// use bigview_render::{Rect, Size};
/// use std::sync::Arc;
///
/// let budget = Arc::new(MemoryBudget::new(5, 64 * 1024 * 1024));
/// let cache = Cache::new(Size::new(4000, 3000), Arc::new(MarginWindowPolicy::new(budget, 4)));
///
/// cache.initialize();
/// assert!(matches!(cache.update(Rect::new(0, 0, 800, 600)), CacheFrame::Sample));
/// assert_eq!(cache.state(), CacheState::StartUpdate);
/// ```
pub struct Cache {
    scene: Size,
    policy: Arc<dyn CacheWindowPolicy>,
    signal: WakeSignal,
    inner: Mutex<Inner>,
}

impl Cache {
    pub fn new(scene: Size, policy: Arc<dyn CacheWindowPolicy>) -> Self {
        Self {
            scene,
            policy,
            signal: WakeSignal::new(),
            inner: Mutex::new(Inner {
                state: CacheState::Uninitialized,
                buffer: None,
                window: Rect::default(),
                epoch: 0,
                cancel: CancellationToken::new(),
                failed_window: None,
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scene_size(&self) -> Size {
        self.scene
    }

    pub fn state(&self) -> CacheState {
        self.lock().state
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Window of the current or most recent pass
    pub fn window(&self) -> Rect {
        self.lock().window
    }

    /// Signal the worker parks on
    pub fn signal(&self) -> &WakeSignal {
        &self.signal
    }

    pub fn policy(&self) -> &Arc<dyn CacheWindowPolicy> {
        &self.policy
    }

    /// Arm the cache; only the first call has an effect
    pub fn initialize(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != CacheState::Uninitialized {
            return false;
        }
        inner.transition(CacheState::Initialized);
        true
    }

    /// Frame source for a viewport showing `rect`
    ///
    /// Requests a refill when the cache is armed but holds nothing usable for
    /// `rect`. After a failed load, no refill is requested until `rect` leaves
    /// the failed window or the cache is invalidated. Never waits for the
    /// worker.
    pub fn update(&self, rect: Rect) -> CacheFrame {
        let visible = rect.intersect(&self.scene.to_rect()).unwrap_or(rect);
        let mut inner = self.lock();

        match inner.state {
            CacheState::Ready => {
                if let Some(buffer) = &inner.buffer {
                    if inner.window.contains_rect(&visible) {
                        let frame = CacheFrame::Cached {
                            buffer: Arc::clone(buffer),
                            window: inner.window,
                        };
                        inner.stats.hits += 1;
                        return frame;
                    }
                }
                self.request_refill(&mut inner);
            }
            CacheState::Initialized => {
                let held_back = inner
                    .failed_window
                    .is_some_and(|failed| failed.contains_rect(&visible));
                if !held_back {
                    inner.failed_window = None;
                    self.request_refill(&mut inner);
                }
            }
            CacheState::Uninitialized
            | CacheState::StartUpdate
            | CacheState::InUpdate
            | CacheState::Suspended => {}
        }

        inner.stats.misses += 1;
        CacheFrame::Sample
    }

    fn request_refill(&self, inner: &mut Inner) {
        if self.policy.is_exhausted() {
            inner.transition(CacheState::Initialized);
            return;
        }
        inner.transition(CacheState::StartUpdate);
        inner.stats.refills_requested += 1;
        self.signal.wake();
    }

    /// Forget the ready buffer's validity and wake the worker
    ///
    /// Any pass in flight is superseded; its result will be discarded.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        if inner.state == CacheState::Uninitialized {
            return;
        }
        inner.supersede();
        inner.failed_window = None;
        inner.transition(CacheState::Initialized);
        drop(inner);

        tracing::debug!("cache invalidated");
        self.signal.wake();
    }

    /// Pause (`true`) or resume (`false`) refilling
    ///
    /// A buffer already loaded is kept. Resuming re-arms the cache, so the
    /// next update requests a fresh refill.
    pub fn suspend(&self, suspend: bool) {
        let mut inner = self.lock();
        match (suspend, inner.state) {
            (_, CacheState::Uninitialized) => {}
            (true, CacheState::Suspended) => {}
            (true, _) => {
                inner.supersede();
                inner.transition(CacheState::Suspended);
            }
            (false, CacheState::Suspended) => inner.transition(CacheState::Initialized),
            (false, _) => {}
        }
    }

    /// Start a pass if a refill is pending
    ///
    /// Moves StartUpdate to InUpdate and releases the previous buffer.
    pub fn begin_pass(&self) -> Option<Pass> {
        let mut inner = self.lock();
        if inner.state != CacheState::StartUpdate {
            return None;
        }
        inner.transition(CacheState::InUpdate);
        inner.buffer = None;
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.cancel = CancellationToken::new();

        Some(Pass {
            epoch: inner.epoch,
            cancel: inner.cancel.clone(),
        })
    }

    /// Size and store the window for a pass from a viewport snapshot
    ///
    /// Returns `None` when the pass was superseded in the meantime.
    pub fn prepare_window(&self, pass: &Pass, viewport: Rect) -> Option<Rect> {
        let mut inner = self.lock();
        if !inner.is_current(pass) {
            return None;
        }
        let window = self.policy.compute_window(viewport, self.scene);
        inner.window = window;
        Some(window)
    }

    /// Commit the result of a pass
    pub fn finish_pass(&self, pass: Pass, result: Result<PixelBuffer, LoadError>) -> PassOutcome {
        let mut inner = self.lock();
        let current = inner.is_current(&pass);

        match result {
            Ok(buffer) if current => {
                let size = buffer.dimensions();
                if size != (inner.window.size().width, inner.window.size().height) {
                    tracing::warn!(
                        window = %inner.window,
                        width = size.0,
                        height = size.1,
                        "region loader returned mismatched buffer"
                    );
                }
                inner.buffer = Some(Arc::new(buffer));
                inner.failed_window = None;
                inner.stats.loads_published += 1;
                inner.transition(CacheState::Ready);
                tracing::debug!(window = %inner.window, "cache window ready");
                PassOutcome::Published
            }
            Ok(_) | Err(LoadError::Cancelled) => {
                inner.stats.loads_discarded += 1;
                tracing::debug!(epoch = pass.epoch, "superseded load discarded");
                PassOutcome::Superseded
            }
            Err(LoadError::AllocationFailure { bytes }) => {
                inner.stats.allocation_failures += 1;
                tracing::warn!(bytes, window = %inner.window, "cache window allocation failed");
                self.policy.on_allocation_failure();

                if !current {
                    return PassOutcome::Superseded;
                }
                if self.policy.is_exhausted() {
                    tracing::warn!("cache budget exhausted, serving sample only");
                    inner.transition(CacheState::Initialized);
                    PassOutcome::Exhausted
                } else {
                    inner.transition(CacheState::StartUpdate);
                    inner.stats.refills_requested += 1;
                    PassOutcome::Retry
                }
            }
            Err(err @ LoadError::Region(_)) => {
                inner.stats.load_errors += 1;
                tracing::error!(%err, window = %inner.window, "region load failed");
                if !current {
                    return PassOutcome::Superseded;
                }
                inner.failed_window = Some(inner.window);
                inner.transition(CacheState::Initialized);
                PassOutcome::Failed
            }
        }
    }

    /// Re-arm a cache whose refill is being cut short by a worker stop
    ///
    /// Supersedes and cancels the pass in flight so its result is never
    /// published. Returns whether a pending or in-flight refill was reset.
    pub fn reset_interrupted(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CacheState::StartUpdate | CacheState::InUpdate => {
                inner.supersede();
                inner.buffer = None;
                inner.transition(CacheState::Initialized);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Cache")
            .field("scene", &self.scene)
            .field("state", &inner.state)
            .field("window", &inner.window)
            .field("has_buffer", &inner.buffer.is_some())
            .finish()
    }
}
