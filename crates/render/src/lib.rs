//! bigview Render Library
//!
//! Scene geometry, pixel buffers, and the collaborator interfaces the cache
//! talks to: region loaders, sample sources, and render surfaces. Includes
//! reference collaborators backed by the `image` crate.

pub mod buffer;
pub mod geometry;
pub mod image_source;
pub mod source;
pub mod surface;

pub use buffer::{blit_region, buffer_bytes, try_allocate, PixelBuffer, BYTES_PER_PIXEL};
pub use geometry::{Point, PointF, Rect, Size};
pub use image_source::{DownsampledSample, ImageRegionLoader};
pub use source::{LoadError, RegionLoader, RenderSurface, SampleSource};
pub use surface::CapturingSurface;
