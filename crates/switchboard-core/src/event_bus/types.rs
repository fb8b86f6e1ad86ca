use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::PlanStep;

/// A published event.
///
/// `id` and `timestamp` are assigned at publish time; the payload is
/// flattened next to them so the wire shape is
/// `{"id": .., "timestamp": .., "type": .., ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id: Uuid,
    /// Generation time
    pub timestamp: DateTime<Utc>,
    /// Typed payload
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Enrich a payload with a fresh id and the current time
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// The `type` discriminator
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// Event payloads, before enrichment.
///
/// **Security note**: events carry task text and results but never
/// credentials; anything subscribed to the bus can read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    /// Orchestration of a request has started
    OrchestratorStarted {
        /// Task being orchestrated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        /// Request text
        request: String,
    },
    /// A plan was produced and delegation begins
    OrchestratorPlanCreated {
        /// Task being orchestrated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        /// Ordered steps
        plan: Vec<PlanStep>,
        /// Planner's analysis
        analysis: String,
    },
    /// The planner needs answers before it can continue
    OrchestratorNeedsClarification {
        /// Task being orchestrated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        /// Open questions
        clarifications: Vec<String>,
    },
    /// A step is being handed to an agent
    OrchestratorDelegating {
        /// Task being orchestrated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        /// Target agent
        agent_id: String,
        /// Step task text
        task: String,
    },
    /// The task finished with a synthesized result
    OrchestratorCompleted {
        /// Task being orchestrated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        /// Final result text
        result: String,
    },
    /// Recoverable (missing agent) or fatal orchestration error
    OrchestratorError {
        /// Task being orchestrated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        /// Error message
        error: String,
        /// Agent the error relates to, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
    },
    /// An agent began executing
    AgentStarted {
        /// Agent id
        agent_id: String,
        /// Agent display name
        agent_name: String,
        /// Task text
        task: String,
    },
    /// An agent is calling the completion service
    AgentThinking {
        /// Agent id
        agent_id: String,
        /// Number of tools offered
        available_tools: usize,
    },
    /// The completion service asked for tool invocations
    AgentToolCalls {
        /// Agent id
        agent_id: String,
        /// Tool names, in call order
        tool_calls: Vec<String>,
    },
    /// An agent finished successfully
    AgentCompleted {
        /// Agent id
        agent_id: String,
        /// Result text
        result: String,
    },
    /// An agent failed
    AgentError {
        /// Agent id
        agent_id: String,
        /// Failure message
        error: String,
    },
    /// An agent asks the caller a question
    AgentQuestion {
        /// Agent id
        agent_id: String,
        /// Question text
        question: String,
        /// Free-form context
        #[serde(default)]
        context: serde_json::Value,
    },
    /// Caller's answer to an agent question
    AgentAnswer {
        /// Agent id
        agent_id: String,
        /// Answer text
        answer: String,
    },
    /// Caller's answer to a task's clarification request
    TaskClarificationAnswer {
        /// Task id
        task_id: Uuid,
        /// Answer text
        answer: String,
    },
}

impl EventKind {
    /// The `type` discriminator as it appears on the wire
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OrchestratorStarted { .. } => "orchestrator_started",
            Self::OrchestratorPlanCreated { .. } => "orchestrator_plan_created",
            Self::OrchestratorNeedsClarification { .. } => "orchestrator_needs_clarification",
            Self::OrchestratorDelegating { .. } => "orchestrator_delegating",
            Self::OrchestratorCompleted { .. } => "orchestrator_completed",
            Self::OrchestratorError { .. } => "orchestrator_error",
            Self::AgentStarted { .. } => "agent_started",
            Self::AgentThinking { .. } => "agent_thinking",
            Self::AgentToolCalls { .. } => "agent_tool_calls",
            Self::AgentCompleted { .. } => "agent_completed",
            Self::AgentError { .. } => "agent_error",
            Self::AgentQuestion { .. } => "agent_question",
            Self::AgentAnswer { .. } => "agent_answer",
            Self::TaskClarificationAnswer { .. } => "task_clarification_answer",
        }
    }

    /// Task id carried by the event, if any
    #[must_use]
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            Self::OrchestratorStarted { task_id, .. }
            | Self::OrchestratorPlanCreated { task_id, .. }
            | Self::OrchestratorNeedsClarification { task_id, .. }
            | Self::OrchestratorDelegating { task_id, .. }
            | Self::OrchestratorCompleted { task_id, .. }
            | Self::OrchestratorError { task_id, .. } => *task_id,
            Self::TaskClarificationAnswer { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }

    /// Agent id carried by the event, if any
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::OrchestratorDelegating { agent_id, .. }
            | Self::AgentStarted { agent_id, .. }
            | Self::AgentThinking { agent_id, .. }
            | Self::AgentToolCalls { agent_id, .. }
            | Self::AgentCompleted { agent_id, .. }
            | Self::AgentError { agent_id, .. }
            | Self::AgentQuestion { agent_id, .. }
            | Self::AgentAnswer { agent_id, .. } => Some(agent_id),
            Self::OrchestratorError { agent_id, .. } => agent_id.as_deref(),
            _ => None,
        }
    }
}
