//! In-memory frame sources.
//!
//! Used by tests and local benchmarks to drive the job engine without a
//! decoder binary.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{MediaError, MediaResult};
use crate::frame::RawFrame;
use crate::source::{FrameSource, SourceOpener};

/// Generates a fixed number of gradient frames.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    fps: f64,
    frame_count: u64,
    reported_total: u64,
    width: u32,
    height: u32,
    fail_at: Option<u64>,
    frame_delay: Option<Duration>,
    next_index: u64,
    closed: bool,
    close_count: Arc<AtomicUsize>,
}

impl SyntheticSource {
    pub fn new(fps: f64, frame_count: u64, width: u32, height: u32) -> Self {
        Self {
            fps,
            frame_count,
            reported_total: frame_count,
            width,
            height,
            fail_at: None,
            frame_delay: None,
            next_index: 0,
            closed: false,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report a different total than the number of frames actually yielded.
    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.reported_total = total;
        self
    }

    /// Fail with a decode error when frame `index` is requested.
    pub fn fail_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Sleep before yielding each frame.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    /// Number of `close` calls made on this source and its clones.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn render(&self, index: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(RawFrame::byte_len(self.width, self.height));
        let shift = (index % 256) as u32;
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        data
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> u64 {
        self.reported_total
    }

    async fn next_frame(&mut self) -> MediaResult<Option<RawFrame>> {
        if self.closed || self.next_index >= self.frame_count {
            return Ok(None);
        }

        let index = self.next_index;
        if self.fail_at == Some(index) {
            return Err(MediaError::decode_failed(index, "synthetic decode fault"));
        }

        if let Some(delay) = self.frame_delay {
            tokio::time::sleep(delay).await;
        }

        self.next_index += 1;
        RawFrame::new(self.width, self.height, self.render(index), index).map(Some)
    }

    async fn close(&mut self) -> MediaResult<()> {
        if !self.closed {
            self.closed = true;
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Opener handing out clones of a template [`SyntheticSource`].
#[derive(Debug, Clone)]
pub struct SyntheticOpener {
    template: SyntheticSource,
    open_error: Option<String>,
}

impl SyntheticOpener {
    pub fn new(template: SyntheticSource) -> Self {
        Self {
            template,
            open_error: None,
        }
    }

    /// Opener whose every `open` fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            template: SyntheticSource::new(30.0, 0, 1, 1),
            open_error: Some(message.into()),
        }
    }

    pub fn template(&self) -> &SyntheticSource {
        &self.template
    }
}

#[async_trait]
impl SourceOpener for SyntheticOpener {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        if let Some(message) = &self.open_error {
            return Err(MediaError::open_failed(path, message.clone()));
        }
        Ok(Box::new(self.template.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_source_yields_all_frames() {
        let mut source = SyntheticSource::new(30.0, 3, 8, 4);
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            assert_eq!(frame.data.len(), 8 * 4 * 3);
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_synthetic_source_fails_at_index() {
        let mut source = SyntheticSource::new(30.0, 5, 2, 2).fail_at(2);
        assert!(source.next_frame().await.unwrap().is_some());
        assert!(source.next_frame().await.unwrap().is_some());
        assert!(matches!(
            source.next_frame().await,
            Err(MediaError::DecodeFailed { index: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_shared() {
        let template = SyntheticSource::new(30.0, 5, 2, 2);
        let opener = SyntheticOpener::new(template.clone());
        let mut source = opener.open(Path::new("in.mp4")).await.unwrap();
        source.close().await.unwrap();
        source.close().await.unwrap();
        assert_eq!(template.close_count(), 1);
        assert!(source.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_opener() {
        let opener = SyntheticOpener::failing("cannot open");
        let result = opener.open(Path::new("in.mp4")).await;
        assert!(matches!(result, Err(MediaError::OpenFailed { .. })));
    }
}
