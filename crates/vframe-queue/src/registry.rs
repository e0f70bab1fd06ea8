//! Shared task state.
//!
//! A single `RwLock<HashMap>` guards every task. Updates run their mutator
//! against a copy and commit it only when the mutator succeeds, so readers
//! never see a half-applied change and a rejected change leaves no trace.
//! The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use vframe_models::{ModelResult, Task, TaskId, TaskStatus};

use crate::error::{QueueError, QueueResult};

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }

    /// Tasks that have not reached a terminal state.
    pub fn active(&self) -> usize {
        self.pending + self.processing
    }
}

/// Process-wide store of task state, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, Task>> {
        // Mutators run on a copy, so the map is consistent even after a panic.
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, Task>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new task and return its snapshot.
    pub fn create(&self, task: Task) -> QueueResult<Task> {
        let mut tasks = self.write();
        if tasks.contains_key(task.id()) {
            return Err(QueueError::AlreadyExists(task.id().clone()));
        }
        debug!(task_id = %task.id(), "Registered task");
        tasks.insert(task.id().clone(), task.clone());
        Ok(task)
    }

    /// Snapshot of one task.
    pub fn get(&self, id: &TaskId) -> QueueResult<Task> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Apply `mutator` atomically and return the updated snapshot.
    ///
    /// If the mutator fails the stored task is unchanged.
    pub fn update<F>(&self, id: &TaskId, mutator: F) -> QueueResult<Task>
    where
        F: FnOnce(&mut Task) -> ModelResult<()>,
    {
        let mut tasks = self.write();
        let stored = tasks
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;

        let mut next = stored.clone();
        mutator(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn count_by_status(&self) -> StatusCounts {
        let tasks = self.read();
        let mut counts = StatusCounts::default();
        for task in tasks.values() {
            match task.status() {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}
