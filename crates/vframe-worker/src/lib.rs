//! Frame extraction job orchestration.
//!
//! This crate provides:
//! - `process_video`, which drives one job from `pending` to a terminal state
//! - `JobExecutor`, which registers submissions and runs them on the tokio
//!   runtime behind a bounded semaphore
//! - Structured job logging and job metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::{BackgroundConfig, BackgroundRemoverKind, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::{process_video, ProcessingContext};
