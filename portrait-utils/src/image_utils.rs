use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, RgbaImage, imageops::FilterType};
use ndarray::{Array3, Axis};

use crate::config::ResizeQuality;

/// Load an image from disk into memory.
///
/// # Arguments
///
/// * `path` - The path to the image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Map the configured resize preference onto an `image` filter.
pub fn resize_filter(quality: ResizeQuality) -> FilterType {
    match quality {
        ResizeQuality::Quality => FilterType::Triangle,
        ResizeQuality::Speed => FilterType::Nearest,
    }
}

/// Resize an RGB image to the requested resolution.
///
/// # Arguments
///
/// * `image` - The image to resize.
/// * `width` - The target width.
/// * `height` - The target height.
/// * `filter` - The sampling filter to use for resizing.
pub fn resize_image(image: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    image::imageops::resize(image, width, height, filter)
}

/// Scale `image` so its width equals `target_width`, keeping the aspect ratio.
///
/// Images already at or below the target width are returned unchanged.
pub fn downscale_to_width(image: &RgbaImage, target_width: u32, filter: FilterType) -> RgbaImage {
    let (width, height) = image.dimensions();
    if target_width == 0 || width <= target_width {
        return image.clone();
    }
    let scaled_height = ((height as f64 / width as f64) * target_width as f64).round() as u32;
    image::imageops::resize(image, target_width, scaled_height.max(1), filter)
}

/// Placement of an aspect-preserving resize inside a square canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    /// Left edge of the content region.
    pub x: u32,
    /// Top edge of the content region.
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute where an `width`x`height` image lands when fitted into a `size`x`size` canvas.
pub fn letterbox_region(width: u32, height: u32, size: u32) -> Result<Letterbox> {
    anyhow::ensure!(
        width > 0 && height > 0 && size > 0,
        "letterbox dimensions must be non-zero"
    );
    let ratio = size as f64 / width.max(height) as f64;
    let content_w = ((width as f64 * ratio).round() as u32).clamp(1, size);
    let content_h = ((height as f64 * ratio).round() as u32).clamp(1, size);
    Ok(Letterbox {
        x: (size - content_w) / 2,
        y: (size - content_h) / 2,
        width: content_w,
        height: content_h,
    })
}

/// Fit `image` into a black `size`x`size` canvas, centered, aspect ratio preserved.
pub fn letterbox_image(
    image: &RgbImage,
    size: u32,
    filter: FilterType,
) -> Result<(RgbImage, Letterbox)> {
    let (width, height) = image.dimensions();
    let region = letterbox_region(width, height, size)?;
    let resized = resize_image(image, region.width, region.height, filter);
    let mut canvas = RgbImage::new(size, size);
    image::imageops::replace(&mut canvas, &resized, region.x as i64, region.y as i64);
    Ok((canvas, region))
}

/// Per-channel normalization applied while building model inputs:
/// `(value * scale - mean[c]) / std[c]` on raw 0..=255 channel values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelNormalization {
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl ChannelNormalization {
    /// Same mean/std on every channel, applied to raw byte values.
    pub fn uniform(mean: f32, std: f32) -> Self {
        Self {
            scale: 1.0,
            mean: [mean; 3],
            std: [std; 3],
        }
    }

    /// Mean/std expressed on 0..=1 values (ImageNet-style statistics).
    pub fn unit_range(mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            scale: 1.0 / 255.0,
            mean,
            std,
        }
    }

    #[inline]
    fn apply(&self, channel: usize, value: u8) -> f32 {
        (value as f32 * self.scale - self.mean[channel]) / self.std[channel]
    }
}

/// Convert an RGB image into a normalized CHW array (channel order R, G, B).
///
/// # Arguments
///
/// * `image` - The RGB image to convert.
/// * `norm` - Normalization applied to every channel value.
pub fn rgb_to_normalized_chw(image: &RgbImage, norm: &ChannelNormalization) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for c in 0..3 {
            array[(c, yi, xi)] = norm.apply(c, pixel[c]);
        }
    }
    array
}

/// Convert an RGB image into a normalized HWC array (channel order R, G, B).
pub fn rgb_to_normalized_hwc(image: &RgbImage, norm: &ChannelNormalization) -> Array3<f32> {
    let mut chw = rgb_to_normalized_chw(image, norm);
    chw.swap_axes(0, 1);
    chw.swap_axes(1, 2);
    chw.as_standard_layout().into_owned()
}

/// Flatten a 3-D array into a contiguous row-major buffer.
pub fn into_contiguous_vec(array: Array3<f32>) -> Vec<f32> {
    if array.is_standard_layout() {
        let (data, offset) = array.into_raw_vec_and_offset();
        debug_assert_eq!(offset.unwrap_or(0), 0, "expected contiguous array");
        data
    } else {
        array.lanes(Axis(2)).into_iter().flatten().copied().collect()
    }
}
