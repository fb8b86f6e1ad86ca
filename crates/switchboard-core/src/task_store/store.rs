use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::types::{Clarification, Task, TaskOutcome, TaskStatus};
use crate::error::{Error, Result};

/// In-memory task store.
///
/// Each task lives in one `DashMap` entry; a setter holds that entry's shard
/// lock for the whole update, so a reader cloning the task sees either the
/// state before or after it, never a mix. Different tasks update in
/// parallel.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: DashMap<Uuid, Task>,
}

impl TaskStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending task
    pub fn create(&self, request: impl Into<String>) -> Uuid {
        let task = Task::new(request);
        let id = task.id;
        self.tasks.insert(id, task);
        debug!(task_id = %id, "Task created");
        id
    }

    /// Snapshot of a task
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.get(&id).map(|t| t.value().clone())
    }

    /// Snapshot of a task, or `TaskNotFound`
    pub fn require(&self, id: Uuid) -> Result<Task> {
        self.get(id).ok_or(Error::TaskNotFound(id))
    }

    /// All tasks, newest first
    #[must_use]
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|t| t.value().clone()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Number of tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `pending -> running`
    pub fn mark_running(&self, id: Uuid) -> Result<()> {
        self.transition(id, TaskStatus::Running, |_| {})
    }

    /// `running -> waiting_for_clarification`, attaching the questions
    pub fn await_clarification(&self, id: Uuid, clarification: Clarification) -> Result<()> {
        self.transition(id, TaskStatus::WaitingForClarification, move |task| {
            task.clarification = Some(clarification);
        })
    }

    /// `waiting_for_clarification -> running`, dropping the questions
    pub fn resume(&self, id: Uuid) -> Result<()> {
        self.transition(id, TaskStatus::Running, |task| {
            task.clarification = None;
        })
    }

    /// `running -> completed`
    pub fn complete(&self, id: Uuid, outcome: TaskOutcome) -> Result<()> {
        self.transition(id, TaskStatus::Completed, move |task| {
            task.result = Some(outcome);
        })
    }

    /// `* -> error` from any non-terminal state
    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        self.transition(id, TaskStatus::Error, move |task| {
            task.clarification = None;
            task.error = Some(error);
        })
    }

    /// Record a caller-supplied answer. Rejected once the task has finished.
    pub fn append_answer(&self, id: Uuid, answer: impl Into<String>) -> Result<()> {
        let mut task = self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))?;
        if task.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: task.status,
                to: task.status,
            });
        }
        task.answers.push(answer.into());
        task.updated_at = Utc::now();
        Ok(())
    }

    /// Drop finished tasks last updated more than `older_than` ago.
    /// Returns how many were removed.
    pub fn prune_finished(&self, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| !(task.status.is_terminal() && task.updated_at < cutoff));
        let removed = before.saturating_sub(self.tasks.len());
        if removed > 0 {
            debug!(removed = removed, "Pruned finished tasks");
        }
        removed
    }

    fn transition<F>(&self, id: Uuid, to: TaskStatus, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Task),
    {
        let mut task = self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))?;
        let from = task.status;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { from, to });
        }

        task.status = to;
        apply(task.value_mut());
        task.updated_at = Utc::now();
        debug!(task_id = %id, from = %from, to = %to, "Task status changed");
        Ok(())
    }
}
