use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of one agent execution.
///
/// Exactly one of `result` and `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    /// Whether the agent succeeded
    pub success: bool,
    /// Result text on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure message otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Agent id
    pub agent_id: String,
    /// Agent display name
    pub agent_name: String,
}

impl AgentResult {
    /// Successful result
    #[must_use]
    pub fn success(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
        }
    }

    /// Failed result
    #[must_use]
    pub fn failure(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
        }
    }

    /// Result text, or the error for a failure
    #[must_use]
    pub fn text(&self) -> &str {
        self.result
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

/// Public description of a registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Agent id
    pub id: String,
    /// Display name
    pub name: String,
    /// What the agent is good at
    pub role: String,
}

/// What an agent knows beyond its task text
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    /// The request the whole task started from
    pub original_request: String,
    /// Results of the steps this one depends on, by step id
    pub dependencies: BTreeMap<String, AgentResult>,
    /// Registered agents (only populated for planning)
    pub agents: Vec<AgentDescriptor>,
}

impl AgentContext {
    /// Context for a request
    #[must_use]
    pub fn new(original_request: impl Into<String>) -> Self {
        Self {
            original_request: original_request.into(),
            ..Self::default()
        }
    }

    /// Attach dependency results
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: BTreeMap<String, AgentResult>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Attach the agent roster
    #[must_use]
    pub fn with_agents(mut self, agents: Vec<AgentDescriptor>) -> Self {
        self.agents = agents;
        self
    }
}

/// An executor of delegated tasks.
///
/// `execute` never fails: every failure is folded into a result with
/// `success: false`. Implementations announce their lifecycle on the bus.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique id used in plans
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Role description shown to the planner
    fn role(&self) -> &str;

    /// Descriptor for the planner
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            id: self.id().to_string(),
            name: self.name().to_string(),
            role: self.role().to_string(),
        }
    }

    /// Run a task
    async fn execute(&self, task: &str, context: &AgentContext) -> AgentResult;
}
