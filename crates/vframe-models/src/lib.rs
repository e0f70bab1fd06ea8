//! Shared data models for the VFrame job engine.
//!
//! This crate provides Serde-serializable types for:
//! - Task identifiers and lifecycle state
//! - Job parameters captured at submission
//! - Output image formats

pub mod error;
pub mod params;
pub mod task;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use params::{JobParams, OutputFormat};
pub use task::{progress_percent, Task, TaskId, TaskStatus};
