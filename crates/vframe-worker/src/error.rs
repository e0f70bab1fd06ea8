//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Worker is shutting down")]
    ShuttingDown,

    #[error("{0}")]
    Media(#[from] vframe_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vframe_storage::StorageError),

    #[error("Task registry error: {0}")]
    Queue(#[from] vframe_queue::QueueError),

    #[error("ML client error: {0}")]
    Ml(#[from] vframe_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<vframe_models::ModelError> for WorkerError {
    fn from(e: vframe_models::ModelError) -> Self {
        Self::Queue(e.into())
    }
}
