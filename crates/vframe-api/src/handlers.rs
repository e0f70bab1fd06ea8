//! HTTP handlers.

pub mod health;
pub mod jobs;

pub use health::{health, ready};
pub use jobs::{download_archive, get_progress, list_frames, serve_output, submit_job};
