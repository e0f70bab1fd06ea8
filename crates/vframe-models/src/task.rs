//! Task state for frame extraction jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::params::JobParams;

/// Highest progress value a task reports before reaching a terminal state.
const MAX_RUNNING_PROGRESS: u8 = 99;

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Registered, waiting for a worker
    #[default]
    Pending,
    /// Frames are being extracted
    Processing,
    /// All frames written
    Completed,
    /// Aborted by a fatal error
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    /// Forward-only transition table.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Error)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Error)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress percentage for `frames_read` out of `total_frames`.
///
/// Zero total frames yields 0. The result is capped below 100, which is
/// reserved for terminal tasks.
pub fn progress_percent(frames_read: u64, total_frames: u64) -> u8 {
    if total_frames == 0 {
        return 0;
    }
    let pct = (frames_read as u128 * 100) / total_frames as u128;
    pct.min(MAX_RUNNING_PROGRESS as u128) as u8
}

/// State of one submitted video job.
///
/// Fields are only mutated through methods that enforce the lifecycle
/// invariants: forward-only status, non-decreasing counters, write-once
/// `total_frames`/`output_dir`/`error_message`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    id: TaskId,
    status: TaskStatus,
    progress: u8,
    frames_count: u64,
    total_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,
    message: String,
    error_message: Option<String>,
    params: JobParams,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task.
    pub fn new(id: TaskId, params: JobParams) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            frames_count: 0,
            total_frames: None,
            output_dir: None,
            message: "Waiting for a worker...".to_string(),
            error_message: None,
            params,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn frames_count(&self) -> u64 {
        self.frames_count
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames.unwrap_or(0)
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn params(&self) -> &JobParams {
        &self.params
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, to: TaskStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending -> processing`.
    pub fn start(&mut self, message: impl Into<String>) -> ModelResult<()> {
        self.transition(TaskStatus::Processing)?;
        self.started_at = Some(Utc::now());
        self.message = message.into();
        Ok(())
    }

    /// Record the frame count reported by the source. Write-once.
    pub fn set_total_frames(&mut self, total_frames: u64) -> ModelResult<()> {
        if self.total_frames.is_some() {
            return Err(ModelError::AlreadySet("total_frames"));
        }
        self.total_frames = Some(total_frames);
        Ok(())
    }

    /// Record the output location. Write-once.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) -> ModelResult<()> {
        if self.output_dir.is_some() {
            return Err(ModelError::AlreadySet("output_dir"));
        }
        self.output_dir = Some(dir.into());
        Ok(())
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Update counters after a raw frame has been read.
    ///
    /// Both `progress` and `frames_count` only ever move forward.
    pub fn record_progress(&mut self, frames_read: u64, frames_written: u64) -> ModelResult<()> {
        if self.status != TaskStatus::Processing {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: TaskStatus::Processing,
            });
        }
        let progress = progress_percent(frames_read, self.total_frames());
        self.progress = self.progress.max(progress);
        self.frames_count = self.frames_count.max(frames_written);
        Ok(())
    }

    /// `processing -> completed`, pinning progress at 100.
    pub fn complete(&mut self, frames_written: u64, message: impl Into<String>) -> ModelResult<()> {
        self.transition(TaskStatus::Completed)?;
        self.frames_count = self.frames_count.max(frames_written);
        self.progress = 100;
        self.message = message.into();
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Enter `error`, pinning progress at 100.
    pub fn fail(&mut self, error_message: impl Into<String>) -> ModelResult<()> {
        self.transition(TaskStatus::Error)?;
        let error_message = error_message.into();
        self.message = error_message.clone();
        self.error_message = Some(error_message);
        self.progress = 100;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing_task(total_frames: u64) -> Task {
        let mut task = Task::new(TaskId::new(), JobParams::default());
        task.start("start").unwrap();
        task.set_total_frames(total_frames).unwrap();
        task
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(TaskId::new(), JobParams::default());
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.progress(), 0);
        assert_eq!(task.frames_count(), 0);
        assert_eq!(task.total_frames(), 0);
        assert!(task.output_dir().is_none());
        assert!(task.error_message().is_none());
    }

    #[test]
    fn test_status_transitions_forward_only() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Error));
        assert!(!TaskStatus::Processing.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Error));
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut task = processing_task(10);
        assert!(matches!(
            task.start("again"),
            Err(ModelError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(50, 0), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(150, 300), 50);
        assert_eq!(progress_percent(300, 300), 99);
        assert_eq!(progress_percent(400, 300), 99);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut task = processing_task(100);
        task.record_progress(50, 5).unwrap();
        assert_eq!(task.progress(), 50);
        task.record_progress(10, 1).unwrap();
        assert_eq!(task.progress(), 50);
        assert_eq!(task.frames_count(), 5);
    }

    #[test]
    fn test_complete_pins_progress() {
        let mut task = processing_task(0);
        task.record_progress(5, 0).unwrap();
        assert_eq!(task.progress(), 0);
        task.complete(0, "done").unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.progress(), 100);
        assert!(task.completed_at().is_some());
        assert!(task.record_progress(6, 0).is_err());
    }

    #[test]
    fn test_fail_sets_error_once() {
        let mut task = processing_task(10);
        task.fail("boom").unwrap();
        assert_eq!(task.status(), TaskStatus::Error);
        assert_eq!(task.error_message(), Some("boom"));
        assert_eq!(task.progress(), 100);
        assert!(task.fail("second").is_err());
        assert_eq!(task.error_message(), Some("boom"));
    }

    #[test]
    fn test_write_once_fields() {
        let mut task = processing_task(10);
        assert!(task.set_total_frames(20).is_err());
        assert_eq!(task.total_frames(), 10);
        task.set_output_dir("/tmp/out").unwrap();
        assert!(task.set_output_dir("/tmp/other").is_err());
        assert_eq!(task.output_dir(), Some(Path::new("/tmp/out")));
    }
}
