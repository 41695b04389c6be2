//! Image preprocessing for model input
//!
//! Every classifier consumes a fixed-size NHWC tensor. This module turns an
//! arbitrary upload into that tensor:
//!
//! 1. Flatten to 3-channel RGB (alpha dropped, grayscale broadcast)
//! 2. Center-crop to the target aspect ratio so nothing gets stretched
//! 3. Resize to the exact target size with Lanczos3
//! 4. Optionally scale pixel values to `[0, 1]`
//! 5. Prepend a batch dimension of 1

use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::utils::error::{PaddyError, Result};

/// How source channels are mapped onto the three model channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPolicy {
    /// Always produce RGB: alpha is discarded and luma is copied to all channels
    #[default]
    ForceRgb,
}

/// Configuration for image preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Scale pixel values from `[0, 255]` to `[0, 1]`
    pub normalize: bool,
    /// Channel handling
    pub channel_policy: ChannelPolicy,
}

impl PreprocessConfig {
    /// Create a config for a `width` x `height` target
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            normalize: true,
            channel_policy: ChannelPolicy::ForceRgb,
        }
    }

    /// Configure normalization
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Shape of the tensor produced by [`preprocess`]: `[1, height, width, 3]`
    pub fn output_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

/// Region of the source image kept by the center crop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the centered crop of a `src_w` x `src_h` image matching the
/// aspect ratio of `dst_w` x `dst_h`.
///
/// The cropped side is truncated toward zero and never drops below one pixel.
pub fn crop_box(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> CropBox {
    let src_ratio = src_w as f64 / src_h as f64;
    let dst_ratio = dst_w as f64 / dst_h as f64;

    if src_ratio > dst_ratio {
        let width = ((src_h as f64 * dst_ratio) as u32).clamp(1, src_w);
        CropBox {
            x: (src_w - width) / 2,
            y: 0,
            width,
            height: src_h,
        }
    } else {
        let height = ((src_w as f64 / dst_ratio) as u32).clamp(1, src_h);
        CropBox {
            x: 0,
            y: (src_h - height) / 2,
            width: src_w,
            height,
        }
    }
}

/// Decode raw upload bytes into an image, guessing the format from its contents
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(PaddyError::InvalidImage("empty file".to_string()));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Flatten any color type to 8-bit RGB.
///
/// Alpha is discarded rather than blended, so transparent pixels keep their
/// stored color. This matches how the training images were prepared.
fn flatten_rgb(image: &DynamicImage, policy: ChannelPolicy) -> RgbImage {
    match (policy, image) {
        (ChannelPolicy::ForceRgb, DynamicImage::ImageRgb8(rgb)) => rgb.clone(),
        (ChannelPolicy::ForceRgb, other) => other.to_rgb8(),
    }
}

/// Crop to the target aspect ratio and resize to the exact target size
pub fn resize_crop(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    let cb = crop_box(src_w, src_h, width, height);
    let cropped = image::imageops::crop_imm(image, cb.x, cb.y, cb.width, cb.height).to_image();

    if cropped.dimensions() == (width, height) {
        return cropped;
    }
    image::imageops::resize(&cropped, width, height, FilterType::Lanczos3)
}

/// Preprocess an image into a `(1, height, width, 3)` float32 tensor
pub fn preprocess(image: &DynamicImage, config: &PreprocessConfig) -> Result<Array4<f32>> {
    if config.width == 0 || config.height == 0 {
        return Err(PaddyError::InvalidInput(format!(
            "target size must be non-zero, got {}x{}",
            config.width, config.height
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(PaddyError::InvalidImage("image has no pixels".to_string()));
    }

    let rgb = flatten_rgb(image, config.channel_policy);
    let resized = resize_crop(&rgb, config.width, config.height);

    let divisor = if config.normalize { 255.0 } else { 1.0 };
    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / divisor)
        .collect();

    Array4::from_shape_vec(config.output_shape(), data)
        .map_err(|e| PaddyError::InvalidInput(format!("tensor shape mismatch: {}", e)))
}
