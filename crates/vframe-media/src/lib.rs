//! Frame decoding and per-frame image transforms.
//!
//! This crate provides:
//! - The `FrameSource` abstraction over video decoders
//! - An FFmpeg-backed source (ffprobe metadata + rawvideo pipe)
//! - In-memory synthetic sources for tests and benchmarks
//! - The ordered frame transform pipeline (sharpen, resize, normalize,
//!   background removal, encode)

pub mod background;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod pipeline;
pub mod probe;
pub mod source;
pub mod synthetic;
pub mod transform;

pub use background::{BackgroundRemover, OpaqueRemover};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegFrameSource, FfmpegSourceOpener};
pub use frame::RawFrame;
pub use pipeline::{output_filename, EncodedFrame, FrameTransformPipeline};
pub use probe::{probe_video, VideoInfo};
pub use source::{FrameSource, SourceOpener};
pub use synthetic::{SyntheticOpener, SyntheticSource};
