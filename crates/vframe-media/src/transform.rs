//! Per-frame image transforms.
//!
//! Pure functions over `image` buffers; the pipeline composes them in a
//! fixed order.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageBuffer, ImageEncoder, Rgb, RgbImage, RgbaImage};

use vframe_models::OutputFormat;

use crate::error::MediaResult;

/// Gaussian sigma of the unsharp-mask low-pass copy.
pub const SHARPEN_SIGMA: f32 = 5.0;

/// Weight of the original image in the unsharp mask.
pub const SHARPEN_ORIGINAL_WEIGHT: f32 = 1.5;

/// Weight of the blurred image in the unsharp mask.
pub const SHARPEN_BLURRED_WEIGHT: f32 = -0.5;

/// Fixed JPEG quality.
pub const JPEG_QUALITY: u8 = 95;

/// Unsharp mask: `original * 1.5 + blurred * -0.5`, saturated to `u8`.
pub fn sharpen(image: &RgbImage) -> RgbImage {
    let blurred = imageops::blur(image, SHARPEN_SIGMA);

    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let original = image.get_pixel(x, y);
        let low = blurred.get_pixel(x, y);
        let mut out = [0u8; 3];
        for (c, value) in out.iter_mut().enumerate() {
            let combined = original[c] as f32 * SHARPEN_ORIGINAL_WEIGHT
                + low[c] as f32 * SHARPEN_BLURRED_WEIGHT;
            *value = combined.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}

/// Output size for a frame capped at `target_width`.
///
/// Frames no wider than the target are left as is; wider frames keep their
/// aspect ratio with the height rounded to the nearest pixel.
pub fn target_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if target_width == 0 || width <= target_width {
        return (width, height);
    }
    let ratio = target_width as f64 / width as f64;
    let target_height = (height as f64 * ratio).round().max(1.0) as u32;
    (target_width, target_height)
}

/// Downscale to `target_width`, never upscaling.
pub fn resize_to_width(image: RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = target_dimensions(width, height, target_width);
    if (new_width, new_height) == (width, height) {
        return image;
    }
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Reorder decoder BGR channels to RGB in place.
pub fn bgr_to_rgb(mut image: RgbImage) -> RgbImage {
    for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
    }
    image
}

/// Drop the alpha channel, keeping RGB values as they are.
pub fn flatten_alpha(image: RgbaImage) -> RgbImage {
    DynamicImage::ImageRgba8(image).into_rgb8()
}

/// Encode a background-removed frame.
pub fn encode(image: RgbaImage, format: OutputFormat) -> MediaResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let mut buf = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buf).write_image(
                image.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        OutputFormat::Jpg => {
            let rgb = flatten_alpha(image);
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Webp => {
            WebPEncoder::new_lossless(&mut buf).write_image(
                image.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
    }

    Ok(buf)
}
