//! Backend-aware image normalization ahead of detection.
//!
//! Accelerator sessions tolerate larger inputs, so the downscale bound
//! depends on the bound backend. Images already within bounds pass through
//! untouched; upsampling never happens.

use image::imageops::FilterType;
use image::RgbImage;

/// Longest edge allowed when an accelerator session is bound.
pub const ACCELERATED_MAX_DIM: u32 = 1920;
/// Longest edge allowed for CPU sessions.
pub const CPU_MAX_DIM: u32 = 1024;

pub fn max_dimension(accelerated: bool) -> u32 {
    if accelerated {
        ACCELERATED_MAX_DIM
    } else {
        CPU_MAX_DIM
    }
}

/// Downscale so the longer edge fits the backend's budget, preserving
/// aspect ratio (Lanczos3). The returned buffer is contiguous row-major
/// RGB, the layout accelerator runtimes expect.
pub fn normalize(image: RgbImage, accelerated: bool) -> RgbImage {
    let max_dim = max_dimension(accelerated);
    let (width, height) = image.dimensions();
    let longer = width.max(height);

    if longer <= max_dim {
        return image;
    }

    let scale = max_dim as f64 / longer as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);

    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = new_width,
        to_height = new_height,
        "downscaled oversized image"
    );

    image::imageops::resize(&image, new_width, new_height, FilterType::Lanczos3)
}
