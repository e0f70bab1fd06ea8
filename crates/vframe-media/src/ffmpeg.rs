//! FFmpeg subprocess frame source.
//!
//! Metadata comes from ffprobe; frames are decoded by a long-running
//! `ffmpeg` process writing packed BGR24 frames to stdout. Display rotation
//! is applied by the decoder, and the probed dimensions already account for it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::frame::RawFrame;
use crate::probe::{probe_video, VideoInfo};
use crate::source::{FrameSource, SourceOpener};

/// Frame source backed by an `ffmpeg -f rawvideo` pipe.
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<String>>,
    next_index: u64,
    frame_len: usize,
}

impl FfmpegFrameSource {
    /// Probe the file and start the decoder.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::open_failed(path, "file does not exist"));
        }

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let info = probe_video(path)
            .await
            .map_err(|e| MediaError::open_failed(path, e.to_string()))?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-autorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "bgr24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;

        // Drain stderr concurrently so a chatty decoder never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        debug!(
            "[FFMPEG_SOURCE] Opened {}: {}x{} (rotation {}) @ {:.3} fps, {} frames",
            path.display(),
            info.width,
            info.height,
            info.rotation,
            info.fps,
            info.total_frames
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame_len: RawFrame::byte_len(info.width, info.height),
            info,
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr_task,
            next_index: 0,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Wait for the decoder to exit after its output is exhausted.
    async fn finish(&mut self) -> MediaResult<()> {
        self.stdout = None;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().await.map_err(|e| {
            MediaError::ffmpeg_failed(format!("FFmpeg process error: {}", e), None, None)
        })?;

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {} while decoding {}", status, self.path.display()),
                Some(stderr),
                status.code(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn total_frames(&self) -> u64 {
        self.info.total_frames
    }

    async fn next_frame(&mut self) -> MediaResult<Option<RawFrame>> {
        let index = self.next_index;
        let Some(reader) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            let n = reader
                .read(&mut buf[filled..])
                .await
                .map_err(|e| MediaError::decode_failed(index, e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.finish().await?;
            return Ok(None);
        }

        if filled < self.frame_len {
            if let Err(e) = self.finish().await {
                warn!("[FFMPEG_SOURCE] Decoder failed after truncated frame: {}", e);
            }
            return Err(MediaError::decode_failed(
                index,
                format!("truncated frame: {} of {} bytes", filled, self.frame_len),
            ));
        }

        self.next_index += 1;
        RawFrame::new(self.info.width, self.info.height, buf, index).map(Some)
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.stdout = None;

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("[FFMPEG_SOURCE] Decoder already exited: {}", e);
            }
            child.wait().await?;
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        Ok(())
    }
}

/// Opens uploaded files with [`FfmpegFrameSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSourceOpener;

#[async_trait]
impl SourceOpener for FfmpegSourceOpener {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        let source = FfmpegFrameSource::open(path).await?;
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = FfmpegFrameSource::open("/nonexistent/video.mp4").await;
        assert!(matches!(result, Err(MediaError::OpenFailed { .. })));
    }

    #[tokio::test]
    async fn test_opener_missing_file() {
        let opener = FfmpegSourceOpener;
        let result = opener.open(Path::new("/nonexistent/clip.mov")).await;
        assert!(result.is_err());
    }
}
