//! In-process task registry and job descriptors.
//!
//! This crate provides:
//! - `TaskRegistry`, the shared keyed store of task state read by pollers
//!   and mutated by workers
//! - `ProcessVideoJob`, the unit of work handed to the worker

pub mod error;
pub mod job;
pub mod registry;

pub use error::{QueueError, QueueResult};
pub use job::ProcessVideoJob;
pub use registry::{StatusCounts, TaskRegistry};
