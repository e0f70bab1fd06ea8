//! Ordered per-frame transform chain.
//!
//! Sampled frames go through, in order: optional sharpen, proportional
//! resize, BGR to RGB, background removal, then encoding. Pixel work runs on
//! the blocking pool; background removal is awaited in between since remote
//! removers do network I/O.

use std::sync::Arc;

use image::RgbImage;
use tracing::trace;

use vframe_models::{JobParams, OutputFormat};

use crate::background::BackgroundRemover;
use crate::error::{MediaError, MediaResult};
use crate::frame::RawFrame;
use crate::transform;

/// Name of the `index`-th extracted frame on disk.
pub fn output_filename(index: u64, format: OutputFormat) -> String {
    format!("frame_{:05}.{}", index, format.extension())
}

/// A transformed, encoded frame ready to be written.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// Stateless transform chain configured from one job's parameters.
#[derive(Clone)]
pub struct FrameTransformPipeline {
    params: JobParams,
    remover: Arc<dyn BackgroundRemover>,
}

impl FrameTransformPipeline {
    pub fn new(params: JobParams, remover: Arc<dyn BackgroundRemover>) -> Self {
        Self { params, remover }
    }

    pub fn params(&self) -> &JobParams {
        &self.params
    }

    /// Run every stage on one frame.
    pub async fn process(&self, frame: RawFrame) -> MediaResult<EncodedFrame> {
        let index = frame.index;
        let unblur = self.params.unblur;
        let target_width = self.params.target_width;

        let rgb = tokio::task::spawn_blocking(move || prepare(frame, unblur, target_width))
            .await??;
        let (width, height) = rgb.dimensions();

        let rgba = self.remover.remove(rgb).await?;
        if rgba.dimensions() != (width, height) {
            return Err(MediaError::background_removal(format!(
                "{} returned {}x{} for a {}x{} frame",
                self.remover.name(),
                rgba.width(),
                rgba.height(),
                width,
                height
            )));
        }

        let format = self.params.output_format;
        let bytes = tokio::task::spawn_blocking(move || transform::encode(rgba, format)).await??;

        trace!(
            frame_index = index,
            width,
            height,
            bytes = bytes.len(),
            "Frame transformed"
        );

        Ok(EncodedFrame {
            bytes,
            width,
            height,
            has_alpha: format.supports_alpha(),
        })
    }
}

/// Stages before background removal.
fn prepare(frame: RawFrame, unblur: bool, target_width: u32) -> MediaResult<RgbImage> {
    let mut image = frame.into_image()?;
    if unblur {
        image = transform::sharpen(&image);
    }
    let image = transform::resize_to_width(image, target_width);
    Ok(transform::bgr_to_rgb(image))
}
