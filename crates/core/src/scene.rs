//! Scene: one cache, one viewport, one refill worker
//!
//! The scene is the owner-facing entry point. Callers set the viewport size,
//! start the worker, then call [`Scene::render`] every frame and feed
//! gestures through [`Scene::apply_gesture`].

use crate::error::{SceneError, SceneResult};
use crate::gesture::GestureEvent;
use crate::viewport::{FrameSource, Viewport};
use bigview_cache::{
    Cache, CacheConfig, CacheState, CacheStats, CacheWindowPolicy, CacheWorker,
    MarginWindowPolicy, MemoryBudget, ViewportProbe,
};
use bigview_render::{
    DownsampledSample, ImageRegionLoader, RegionLoader, RenderSurface, SampleSource, Size,
};
use bigview_scheduler::WorkerError;
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;

/// Pannable, zoomable view of an image too large to decode at once
///
/// Dropping the scene stops and joins its worker.
///
/// # Example
///
/// ```
/// use bigview_cache::CacheConfig;
/// use bigview_core::{FrameSource, Scene};
/// use bigview_render::CapturingSurface;
/// use image::RgbaImage;
///
/// let mut scene = Scene::from_image(RgbaImage::new(2000, 1500), CacheConfig::default()).unwrap();
/// scene.set_viewport_size(400, 300);
/// scene.start().unwrap();
///
/// let mut surface = CapturingSurface::new();
/// assert_eq!(scene.render(&mut surface), FrameSource::Sample);
/// scene.stop().unwrap();
/// ```
pub struct Scene {
    size: Size,
    config: CacheConfig,
    viewport: Arc<Viewport>,
    cache: Arc<Cache>,
    sample: Arc<dyn SampleSource>,
    budget: Option<Arc<MemoryBudget>>,
    worker: CacheWorker,
}

impl Scene {
    /// Scene over `size` with a budget-driven margin policy
    ///
    /// The viewport starts with an empty output buffer and requests no
    /// refills until [`set_viewport_size`](Self::set_viewport_size) is called.
    pub fn new(
        size: Size,
        loader: Box<dyn RegionLoader>,
        sample: Arc<dyn SampleSource>,
        config: CacheConfig,
    ) -> Self {
        let budget = Arc::new(MemoryBudget::new(config.budget_percent, config.max_memory_bytes));
        let policy = Arc::new(MarginWindowPolicy::new(Arc::clone(&budget), config.bytes_per_pixel));
        Self::build(size, loader, sample, policy, Some(budget), config)
    }

    /// Scene with a caller-supplied window policy
    pub fn with_policy(
        size: Size,
        loader: Box<dyn RegionLoader>,
        sample: Arc<dyn SampleSource>,
        policy: Arc<dyn CacheWindowPolicy>,
        config: CacheConfig,
    ) -> Self {
        Self::build(size, loader, sample, policy, None, config)
    }

    fn build(
        size: Size,
        loader: Box<dyn RegionLoader>,
        sample: Arc<dyn SampleSource>,
        policy: Arc<dyn CacheWindowPolicy>,
        budget: Option<Arc<MemoryBudget>>,
        config: CacheConfig,
    ) -> Self {
        let viewport = Arc::new(Viewport::new(size, Size::default(), config.min_pixels_in_view));
        let cache = Arc::new(Cache::new(size, policy));
        let probe: Arc<dyn ViewportProbe> = viewport.clone();
        let worker = CacheWorker::new(Arc::clone(&cache), probe, loader);

        Self {
            size,
            config,
            viewport,
            cache,
            sample,
            budget,
            worker,
        }
    }

    /// Decode the image at `path` into an initialized scene
    pub fn open<P: AsRef<Path>>(path: P, config: CacheConfig) -> SceneResult<Self> {
        let path = path.as_ref();
        let loader = ImageRegionLoader::open(path)?;
        tracing::info!(path = %path.display(), "opened scene image");
        Self::from_loader(loader, config)
    }

    /// Initialized scene over an in-memory image
    pub fn from_image(image: RgbaImage, config: CacheConfig) -> SceneResult<Self> {
        Self::from_loader(ImageRegionLoader::new(Arc::new(image)), config)
    }

    fn from_loader(loader: ImageRegionLoader, config: CacheConfig) -> SceneResult<Self> {
        let size = loader.scene_size();
        if size.is_empty() {
            return Err(SceneError::EmptyImage);
        }

        let sample = DownsampledSample::from_image(loader.image(), config.downsample_shift);
        tracing::debug!(
            width = size.width,
            height = size.height,
            shift = config.downsample_shift,
            "scene sample built"
        );

        let scene = Self::new(size, Box::new(loader), Arc::new(sample), config);
        scene.initialize();
        Ok(scene)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Current budget percentage; `None` for a caller-supplied policy
    pub fn budget_percent(&self) -> Option<u32> {
        self.budget.as_ref().map(|budget| budget.percent())
    }

    /// Arm the cache; only the first call has an effect
    pub fn initialize(&self) -> bool {
        self.cache.initialize()
    }

    /// Start the refill worker, restarting it if already running
    pub fn start(&mut self) -> Result<(), WorkerError> {
        self.worker.start()
    }

    /// Stop the refill worker and wait for it to exit
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        self.worker.stop()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Pause refills, e.g. during a fast fling, or resume them
    pub fn set_suspend(&self, suspend: bool) {
        self.cache.suspend(suspend);
    }

    /// Force a refill, e.g. after the loader's backing data changed
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    pub fn set_viewport_size(&self, width: u32, height: u32) {
        self.viewport.set_size(width, height);
    }

    /// Draw the current view into `surface`
    pub fn render(&self, surface: &mut dyn RenderSurface) -> FrameSource {
        self.viewport
            .draw(&self.cache, self.sample.as_ref(), surface)
    }

    /// Route a gesture to the viewport
    pub fn apply_gesture(&self, event: GestureEvent) {
        match event {
            GestureEvent::Pan { dx, dy } => self.viewport.pan(dx, dy),
            GestureEvent::Zoom { factor, focus } => self.viewport.zoom(factor, focus),
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("size", &self.size)
            .field("viewport", &self.viewport)
            .field("cache", &self.cache)
            .field("running", &self.worker.is_running())
            .finish()
    }
}
