//! Queue error types.

use thiserror::Error;
use vframe_models::{ModelError, TaskId};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task already exists: {0}")]
    AlreadyExists(TaskId),

    #[error("Rejected update: {0}")]
    Model(#[from] ModelError),
}

impl QueueError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
