//! Pixel buffers and region blitting
//!
//! All buffers are RGBA8, so one pixel is [`BYTES_PER_PIXEL`] bytes.

use crate::geometry::{Rect, Size};
use crate::source::LoadError;
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Pixel storage used for cache windows, samples, and viewport output
pub type PixelBuffer = RgbaImage;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Memory footprint of a buffer of `size`
pub fn buffer_bytes(size: Size) -> u64 {
    size.area().saturating_mul(BYTES_PER_PIXEL as u64)
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting
///
/// # Example
///
/// ```
/// use bigview_render::{try_allocate, Size};
///
/// let buffer = try_allocate(Size::new(64, 32)).unwrap();
/// assert_eq!(buffer.dimensions(), (64, 32));
/// ```
pub fn try_allocate(size: Size) -> Result<PixelBuffer, LoadError> {
    let bytes = buffer_bytes(size);
    let len = usize::try_from(bytes).map_err(|_| LoadError::AllocationFailure { bytes })?;

    let mut pixels: Vec<u8> = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| LoadError::AllocationFailure { bytes })?;
    pixels.resize(len, 0);

    RgbaImage::from_raw(size.width, size.height, pixels)
        .ok_or(LoadError::AllocationFailure { bytes })
}

/// Resample `src_rect` of `src` onto the whole of `dst`
///
/// `src_rect` is in `src` pixel coordinates and maps onto `dst` at a fixed
/// scale. Parts of it outside the source bounds are not drawn, so the
/// matching `dst` pixels keep their contents. Nearest-neighbour scaling;
/// when sizes match this is a plain copy. Returns `false` when nothing could
/// be copied.
pub fn blit_region(src: &PixelBuffer, src_rect: Rect, dst: &mut PixelBuffer) -> bool {
    let bounds = Rect::from_xywh(0, 0, src.width(), src.height());
    let Some(clipped) = src_rect.intersect(&bounds) else {
        return false;
    };
    if dst.width() == 0 || dst.height() == 0 {
        return false;
    }

    let target = Rect::new(
        scale_edge(clipped.left - src_rect.left, src_rect.width(), dst.width()),
        scale_edge(clipped.top - src_rect.top, src_rect.height(), dst.height()),
        scale_edge(clipped.right - src_rect.left, src_rect.width(), dst.width()),
        scale_edge(clipped.bottom - src_rect.top, src_rect.height(), dst.height()),
    );
    if target.is_empty() {
        return false;
    }

    let region = imageops::crop_imm(
        src,
        clipped.left as u32,
        clipped.top as u32,
        clipped.width() as u32,
        clipped.height() as u32,
    )
    .to_image();

    let (width, height) = (target.width() as u32, target.height() as u32);
    if region.dimensions() == (width, height) {
        imageops::replace(dst, &region, target.left as i64, target.top as i64);
    } else {
        let scaled = imageops::resize(&region, width, height, FilterType::Nearest);
        imageops::replace(dst, &scaled, target.left as i64, target.top as i64);
    }
    true
}

/// Map an offset along a `src_len` source span onto a `dst_len` span, rounded
fn scale_edge(offset: i32, src_len: i32, dst_len: u32) -> i32 {
    let src_len = i64::from(src_len.max(1));
    let scaled = (i64::from(offset) * i64::from(dst_len) * 2 + src_len) / (2 * src_len);
    scaled.clamp(0, i64::from(dst_len)) as i32
}
