// convert.rs — CPU reference for the RGB → grayscale conversion.
//
// The pipeline never calls this: the conversion runs in the WGSL kernel.
// It exists so GPU output can be checked against a known-good result, the
// same way each GPU kernel is validated against a CPU implementation.
//
// Formula (ITU-R BT.601 luma), matching kernel.wgsl:
//   Y = 0.299 R + 0.587 G + 0.114 B, rounded to nearest, clamped to 0..=255.
//
// GPU float arithmetic may fuse multiply-adds, so comparisons allow a
// difference of one level (see `max_abs_diff`).

use crate::image::HostImage;

pub const LUMA_R: f32 = 0.299;
pub const LUMA_G: f32 = 0.587;
pub const LUMA_B: f32 = 0.114;

/// Luma of one RGB pixel.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Convert an interleaved RGB buffer to one byte per pixel.
///
/// # Panics
/// Panics if `rgb.len()` is not a multiple of 3.
pub fn rgb_to_grayscale(rgb: &[u8]) -> Vec<u8> {
    assert_eq!(rgb.len() % 3, 0, "RGB buffer length must be a multiple of 3");
    rgb.chunks_exact(3).map(|p| luma(p[0], p[1], p[2])).collect()
}

/// Grayscale copy of an RGB image.
pub fn grayscale_image(src: &HostImage) -> HostImage {
    assert_eq!(src.channels(), 3, "expected an RGB image");
    HostImage::from_vec(src.width(), src.height(), 1, rgb_to_grayscale(src.as_bytes()))
}

/// Largest per-byte difference between two equally sized buffers.
pub fn max_abs_diff(a: &[u8], b: &[u8]) -> u8 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
}
