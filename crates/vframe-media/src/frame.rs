//! Raw decoded frames.

use image::RgbImage;

use crate::error::{MediaError, MediaResult};

/// A decoded frame in decoder channel order (packed BGR24).
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Packed B, G, R bytes, row-major
    pub data: Vec<u8>,
    /// Zero-based position in the decoded stream
    pub index: u64,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, index: u64) -> MediaResult<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(MediaError::InvalidFrame(format!(
                "frame {} has {} bytes, expected {} for {}x{}",
                index,
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            index,
        })
    }

    /// Bytes per BGR24 frame of the given size.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Wrap the buffer as a 3-channel image.
    ///
    /// Channels stay in decoder order; only [`crate::transform::bgr_to_rgb`]
    /// reorders them.
    pub fn into_image(self) -> MediaResult<RgbImage> {
        let index = self.index;
        RgbImage::from_raw(self.width, self.height, self.data).ok_or_else(|| {
            MediaError::InvalidFrame(format!("frame {} buffer does not match its size", index))
        })
    }
}
