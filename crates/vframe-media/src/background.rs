//! Background removal capability.

use async_trait::async_trait;
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::MediaResult;

/// Turns an RGB frame into an RGBA frame with the background made transparent.
///
/// Implementations must return an image of the same dimensions.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove(&self, image: RgbImage) -> MediaResult<RgbaImage>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Whether the remover is ready to accept frames.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Keeps every pixel, with a fully opaque alpha channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueRemover;

#[async_trait]
impl BackgroundRemover for OpaqueRemover {
    async fn remove(&self, image: RgbImage) -> MediaResult<RgbaImage> {
        Ok(DynamicImage::ImageRgb8(image).into_rgba8())
    }

    fn name(&self) -> &'static str {
        "opaque"
    }
}
