//! Orchestrator struct, builder and planning agent

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use switchboard_llm::SharedLlmProvider;
use tracing::info;

use super::config::OrchestratorConfig;
use super::planning::PLANNING_PROMPT;
use crate::agents::{
    Agent, AgentContext, AgentDescriptor, AgentResult, LlmAgent, LlmAgentConfig, ReplyRouter,
};
use crate::error::{Error, Result};
use crate::event_bus::{EventKind, SharedEventBus};
use crate::task_store::TaskStore;

/// Agent id of the orchestrator itself
pub const ORCHESTRATOR_ID: &str = "orchestrator";

/// Plans requests and delegates the steps to registered agents.
///
/// One orchestrator serves any number of concurrent tasks; per-task state
/// lives in the [`TaskStore`] and in the reply router's pending table.
pub struct Orchestrator {
    pub(super) bus: SharedEventBus,
    pub(super) tasks: Arc<TaskStore>,
    pub(super) replies: Arc<ReplyRouter>,
    pub(super) provider: SharedLlmProvider,
    pub(super) agents: BTreeMap<String, Arc<dyn Agent>>,
    pub(super) planner: LlmAgent,
    pub(super) config: OrchestratorConfig,
}

impl Orchestrator {
    /// Start building an orchestrator
    #[must_use]
    pub fn builder(bus: SharedEventBus, provider: SharedLlmProvider) -> OrchestratorBuilder {
        OrchestratorBuilder::new(bus, provider)
    }

    /// Event bus handle
    #[must_use]
    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    /// Task store
    #[must_use]
    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    /// Reply router shared with agents
    #[must_use]
    pub fn replies(&self) -> &Arc<ReplyRouter> {
        &self.replies
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Look up a registered agent
    #[must_use]
    pub fn agent(&self, id: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.get(id)
    }

    /// Registered agents, ordered by id
    #[must_use]
    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.agents.values().map(|agent| agent.descriptor()).collect()
    }

    pub(super) async fn emit(&self, kind: EventKind) {
        self.bus.publish(kind).await;
    }
}

#[async_trait]
impl Agent for Orchestrator {
    fn id(&self) -> &str {
        ORCHESTRATOR_ID
    }

    fn name(&self) -> &str {
        "Orchestrator"
    }

    fn role(&self) -> &str {
        "Plans requests and delegates them to specialist agents"
    }

    /// Ask the completion service for a JSON plan. The roster of registered
    /// agents is added to whatever context the caller passes.
    async fn execute(&self, task: &str, context: &AgentContext) -> AgentResult {
        let context = context.clone().with_agents(self.descriptors());
        self.planner.execute(task, &context).await
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    bus: SharedEventBus,
    provider: SharedLlmProvider,
    tasks: Option<Arc<TaskStore>>,
    replies: Option<Arc<ReplyRouter>>,
    config: OrchestratorConfig,
    agents: Vec<Arc<dyn Agent>>,
}

impl OrchestratorBuilder {
    /// New builder with default configuration and no agents
    #[must_use]
    pub fn new(bus: SharedEventBus, provider: SharedLlmProvider) -> Self {
        Self {
            bus,
            provider,
            tasks: None,
            replies: None,
            config: OrchestratorConfig::default(),
            agents: Vec::new(),
        }
    }

    /// Share an existing task store
    #[must_use]
    pub fn with_task_store(mut self, tasks: Arc<TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Share an existing reply router (must be attached to the same bus)
    #[must_use]
    pub fn with_reply_router(mut self, replies: Arc<ReplyRouter>) -> Self {
        self.replies = Some(replies);
        self
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an agent
    #[must_use]
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or reserved agent ids, or if the reply router
    /// cannot subscribe to the bus
    pub async fn build(self) -> Result<Arc<Orchestrator>> {
        let mut agents: BTreeMap<String, Arc<dyn Agent>> = BTreeMap::new();
        for agent in self.agents {
            let id = agent.id().to_string();
            if id == ORCHESTRATOR_ID {
                return Err(Error::Configuration(format!(
                    "agent id '{}' is reserved",
                    ORCHESTRATOR_ID
                )));
            }
            if agents.insert(id.clone(), agent).is_some() {
                return Err(Error::Configuration(format!(
                    "duplicate agent id '{}'",
                    id
                )));
            }
        }

        let replies = match self.replies {
            Some(replies) => replies,
            None => ReplyRouter::attach(self.bus.as_ref()).await?,
        };

        let planner = LlmAgent::new(
            LlmAgentConfig::new(
                ORCHESTRATOR_ID,
                "Orchestrator",
                "Plans requests and delegates them to specialist agents",
            )
            .with_system_prompt(PLANNING_PROMPT)
            .with_temperature(self.config.planning_temperature),
            self.bus.clone(),
            self.provider.clone(),
        );

        info!(
            agents = agents.len(),
            backend = %self.bus.backend(),
            "Orchestrator ready"
        );

        Ok(Arc::new(Orchestrator {
            bus: self.bus,
            tasks: self.tasks.unwrap_or_default(),
            replies,
            provider: self.provider,
            agents,
            planner,
            config: self.config,
        }))
    }
}
