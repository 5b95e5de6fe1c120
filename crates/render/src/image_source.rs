//! Collaborators backed by a decoded `image` buffer
//!
//! [`ImageRegionLoader`] plays the role of a region decoder: it hands out
//! full-resolution crops of a source image. [`DownsampledSample`] keeps a
//! `1 << shift` reduced copy of the whole scene for instant fallback frames.

use crate::buffer::{blit_region, buffer_bytes, PixelBuffer, BYTES_PER_PIXEL};
use crate::geometry::{Rect, Size};
use crate::source::{LoadError, RegionLoader, SampleSource};
use bigview_scheduler::CancellationToken;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;

/// Region loader that crops out of an in-memory RGBA image
///
/// # Example
///
/// ```
/// use bigview_render::{ImageRegionLoader, Rect, RegionLoader};
/// use bigview_scheduler::CancellationToken;
/// use image::RgbaImage;
/// use std::sync::Arc;
///
/// let mut loader = ImageRegionLoader::new(Arc::new(RgbaImage::new(400, 300)));
/// let region = loader.load(Rect::new(10, 10, 110, 60), &CancellationToken::new()).unwrap();
/// assert_eq!(region.dimensions(), (100, 50));
/// ```
#[derive(Debug, Clone)]
pub struct ImageRegionLoader {
    image: Arc<RgbaImage>,
    /// Largest region this loader will allocate; `None` means unbounded
    max_region_bytes: Option<u64>,
    loads: u64,
}

impl ImageRegionLoader {
    pub fn new(image: Arc<RgbaImage>) -> Self {
        Self {
            image,
            max_region_bytes: None,
            loads: 0,
        }
    }

    /// Decode the image at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, image::ImageError> {
        let image = image::open(path.as_ref())?.into_rgba8();
        Ok(Self::new(Arc::new(image)))
    }

    /// Refuse regions larger than `bytes`, as a constrained allocator would
    pub fn with_max_region_bytes(mut self, bytes: u64) -> Self {
        self.max_region_bytes = Some(bytes);
        self
    }

    pub fn scene_size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    /// Shared handle to the source pixels
    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    /// Number of successful loads
    pub fn loads(&self) -> u64 {
        self.loads
    }
}

impl RegionLoader for ImageRegionLoader {
    fn load(&mut self, rect: Rect, cancel: &CancellationToken) -> Result<PixelBuffer, LoadError> {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        if rect.is_empty() || !rect.fits_within(self.scene_size()) {
            return Err(LoadError::Region(format!(
                "region {} outside scene {}x{}",
                rect,
                self.image.width(),
                self.image.height()
            )));
        }

        let size = rect.size();
        let bytes = buffer_bytes(size);
        if self.max_region_bytes.is_some_and(|max| bytes > max) {
            return Err(LoadError::AllocationFailure { bytes });
        }

        let mut pixels: Vec<u8> = Vec::new();
        pixels
            .try_reserve_exact(bytes as usize)
            .map_err(|_| LoadError::AllocationFailure { bytes })?;

        let source: &[u8] = &self.image;
        let stride = self.image.width() as usize * BYTES_PER_PIXEL;
        let row_bytes = size.width as usize * BYTES_PER_PIXEL;
        let column = rect.left as usize * BYTES_PER_PIXEL;

        for y in rect.top..rect.bottom {
            if cancel.is_cancelled() {
                return Err(LoadError::Cancelled);
            }
            let start = y as usize * stride + column;
            pixels.extend_from_slice(&source[start..start + row_bytes]);
        }

        let region = RgbaImage::from_raw(size.width, size.height, pixels)
            .ok_or_else(|| LoadError::Region(format!("region {rect} has inconsistent size")))?;

        self.loads += 1;
        Ok(region)
    }
}

/// Low-resolution whole-scene fallback at a fixed downsample shift
///
/// A shift of 3 keeps one pixel out of every 8x8 block.
#[derive(Debug, Clone)]
pub struct DownsampledSample {
    sample: RgbaImage,
    shift: u32,
}

impl DownsampledSample {
    /// Build the sample from a full-resolution image
    pub fn from_image(full: &RgbaImage, shift: u32) -> Self {
        let width = (full.width() >> shift).max(1);
        let height = (full.height() >> shift).max(1);
        let sample = imageops::resize(full, width, height, FilterType::Nearest);
        Self { sample, shift }
    }

    /// Wrap an already reduced buffer
    pub fn from_buffer(sample: RgbaImage, shift: u32) -> Self {
        Self { sample, shift }
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn sample(&self) -> &RgbaImage {
        &self.sample
    }

    /// Map a scene rectangle into sample pixels, never collapsing to nothing
    pub fn sample_rect(&self, scene_rect: Rect) -> Rect {
        let left = scene_rect.left >> self.shift;
        let top = scene_rect.top >> self.shift;
        let width = (scene_rect.width() >> self.shift).max(1);
        let height = (scene_rect.height() >> self.shift).max(1);
        Rect::new(left, top, left + width, top + height)
    }
}

impl SampleSource for DownsampledSample {
    fn render(&self, target: &mut PixelBuffer, scene_rect: Rect) {
        let src = self.sample_rect(scene_rect);
        if !blit_region(&self.sample, src, target) {
            tracing::trace!(%scene_rect, "sample has no pixels for rect");
        }
    }
}
