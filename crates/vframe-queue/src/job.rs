//! Job types for the worker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vframe_models::{JobParams, TaskId};

/// Job to extract frames from an uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    /// Task the job reports into
    pub job_id: TaskId,
    /// Saved upload; removed once the job finishes
    pub input_path: PathBuf,
    /// Client-supplied file name, for logs
    pub original_filename: String,
    pub params: JobParams,
}

impl ProcessVideoJob {
    pub fn new(
        job_id: TaskId,
        input_path: impl Into<PathBuf>,
        original_filename: impl Into<String>,
        params: JobParams,
    ) -> Self {
        Self {
            job_id,
            input_path: input_path.into(),
            original_filename: original_filename.into(),
            params,
        }
    }
}
