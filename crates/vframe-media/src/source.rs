//! Frame source abstraction.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MediaResult;
use crate::frame::RawFrame;

/// A lazily decoded sequence of frames from one video.
///
/// Frames are yielded in increasing index order starting at 0. `close`
/// releases decoder resources and must be safe to call more than once;
/// implementations also release them on drop.
#[async_trait]
pub trait FrameSource: Send {
    /// Frames per second reported by the container.
    fn fps(&self) -> f64;

    /// Frame count reported by the container; may be zero.
    fn total_frames(&self) -> u64;

    /// Next decoded frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<RawFrame>>;

    /// Release decoder resources.
    async fn close(&mut self) -> MediaResult<()>;
}

/// Opens frame sources for uploaded files.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>>;
}
