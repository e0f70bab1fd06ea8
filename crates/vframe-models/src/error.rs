//! Model error types.

use thiserror::Error;

use crate::task::TaskStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Field already set: {0}")]
    AlreadySet(&'static str),
}

impl ModelError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }
}
