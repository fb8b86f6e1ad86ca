use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::AgentResult;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not started
    Pending,
    /// Planning, delegating or synthesizing
    Running,
    /// Paused until the caller answers the open questions
    WaitingForClarification,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Error,
}

impl TaskStatus {
    /// Whether the task has finished
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Transitions only go forward, except that a task may bounce between
    /// running and waiting for clarification any number of times.
    #[must_use]
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Error)
                | (Running, WaitingForClarification)
                | (Running, Completed)
                | (Running, Error)
                | (WaitingForClarification, Running)
                | (WaitingForClarification, Error)
        )
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::WaitingForClarification => "waiting_for_clarification",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open questions attached to a task waiting for clarification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clarification {
    /// Questions for the caller
    pub questions: Vec<String>,
    /// Planner's analysis at the time of asking
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Result of one delegated plan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    /// Step id from the plan
    pub step_id: String,
    /// Agent that ran the step
    pub agent_id: String,
    /// Agent result
    pub result: AgentResult,
    /// When the agent returned
    pub completed_at: DateTime<Utc>,
}

/// Final result of a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    /// Always true for a completed task
    pub success: bool,
    /// Synthesized answer
    pub result: String,
    /// Per-step results in execution order
    pub agent_results: Vec<StepOutcome>,
    /// Planner's analysis
    pub analysis: String,
}

/// Snapshot of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task id
    pub id: Uuid,
    /// Current status
    pub status: TaskStatus,
    /// Original request
    pub request: String,
    /// Set once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskOutcome>,
    /// Set once failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set only while waiting for clarification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<Clarification>,
    /// Answers supplied by the caller, oldest first
    #[serde(default)]
    pub answers: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub(crate) fn new(request: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            request: request.into(),
            result: None,
            error: None,
            clarification: None,
            answers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
