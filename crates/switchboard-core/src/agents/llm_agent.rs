//! LLM-backed agent
//!
//! Lifecycle on the bus: `agent_started`, then `agent_thinking` with the
//! number of offered tools, `agent_tool_calls` if the model asks for tools,
//! and finally `agent_completed` or `agent_error`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_llm::{
    CompletionRequest, Message, SharedLlmProvider, ToolChoice, ToolCompletionRequest,
    ToolDefinition,
};
use switchboard_tools::ToolRunner;
use tracing::{debug, info, warn};

use super::agent::{Agent, AgentContext, AgentResult};
use super::replies::{ReplyKey, ReplyRouter};
use crate::error::{Error, Result};
use crate::event_bus::{EventKind, SharedEventBus};

/// Default wait for an answer to `ask_clarification`
const DEFAULT_QUESTION_TIMEOUT: Duration = Duration::from_secs(1800);

/// Agent definition (`[[agents]]` in configuration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAgentConfig {
    /// Unique id used in plans
    pub id: String,
    /// Display name
    pub name: String,
    /// Role description shown to the planner
    pub role: String,
    /// System prompt; derived from name and role when absent
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Tool servers this agent may use (empty = every registered server)
    #[serde(default)]
    pub tool_servers: Vec<String>,
    /// Model override
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Completion token cap
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl LlmAgentConfig {
    /// Minimal definition
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            system_prompt: None,
            tool_servers: Vec::new(),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Restrict tools to the given servers
    #[must_use]
    pub fn with_tool_servers(mut self, servers: Vec<String>) -> Self {
        self.tool_servers = servers;
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Completion-backed agent
pub struct LlmAgent {
    config: LlmAgentConfig,
    bus: SharedEventBus,
    provider: SharedLlmProvider,
    tools: Option<Arc<ToolRunner>>,
    replies: Option<Arc<ReplyRouter>>,
    question_timeout: Duration,
}

impl LlmAgent {
    /// Create an agent without tools
    #[must_use]
    pub fn new(config: LlmAgentConfig, bus: SharedEventBus, provider: SharedLlmProvider) -> Self {
        Self {
            config,
            bus,
            provider,
            tools: None,
            replies: None,
            question_timeout: DEFAULT_QUESTION_TIMEOUT,
        }
    }

    /// Give the agent access to a tool runner
    #[must_use]
    pub fn with_tools(mut self, runner: Arc<ToolRunner>) -> Self {
        self.tools = Some(runner);
        self
    }

    /// Enable `ask_clarification` through a reply router
    #[must_use]
    pub fn with_replies(mut self, router: Arc<ReplyRouter>) -> Self {
        self.replies = Some(router);
        self
    }

    /// Set how long `ask_clarification` waits
    #[must_use]
    pub fn with_question_timeout(mut self, timeout: Duration) -> Self {
        self.question_timeout = timeout;
        self
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &LlmAgentConfig {
        &self.config
    }

    /// Tools offered to the model
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .as_ref()
            .map(|runner| runner.definitions_for(&self.config.tool_servers))
            .unwrap_or_default()
    }

    /// Ask the caller a question and wait for the matching `agent_answer`.
    ///
    /// # Errors
    ///
    /// Fails if no reply router is attached, if a question from this agent
    /// is already pending, or if no answer arrives in time
    pub async fn ask_clarification(
        &self,
        question: impl Into<String>,
        context: serde_json::Value,
    ) -> Result<String> {
        let router = self.replies.as_ref().ok_or_else(|| {
            Error::Configuration(format!("agent '{}' has no reply router", self.config.id))
        })?;

        let pending = router.register(ReplyKey::Agent(self.config.id.clone()))?;
        let question = question.into();
        info!(agent_id = %self.config.id, question = %question, "Agent asking for clarification");
        self.bus
            .publish(EventKind::AgentQuestion {
                agent_id: self.config.id.clone(),
                question,
                context,
            })
            .await;

        pending.wait(self.question_timeout).await
    }

    fn system_prompt(&self) -> String {
        self.config.system_prompt.clone().unwrap_or_else(|| {
            format!(
                "You are {}, {}. Complete the task you are given and reply with the result only.",
                self.config.name, self.config.role
            )
        })
    }

    fn user_prompt(task: &str, context: &AgentContext) -> String {
        let mut prompt = task.to_string();

        if !context.agents.is_empty() {
            prompt.push_str("\n\nAvailable agents:");
            for agent in &context.agents {
                prompt.push_str(&format!("\n- {} ({}): {}", agent.id, agent.name, agent.role));
            }
        }

        if !context.dependencies.is_empty() {
            prompt.push_str("\n\nResults from previous steps:");
            for (step_id, result) in &context.dependencies {
                match (&result.result, &result.error) {
                    (Some(text), _) if result.success => prompt.push_str(&format!(
                        "\n[{}] {}: {}",
                        step_id, result.agent_name, text
                    )),
                    _ => prompt.push_str(&format!(
                        "\n[{}] {}: FAILED: {}",
                        step_id,
                        result.agent_name,
                        result.text()
                    )),
                }
            }
        }

        if !context.original_request.is_empty() && context.original_request != task {
            prompt.push_str(&format!("\n\nOriginal request: {}", context.original_request));
        }

        prompt
    }

    fn request(&self, messages: Vec<Message>) -> CompletionRequest {
        let mut request = CompletionRequest::new(messages);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    async fn run(&self, task: &str, context: &AgentContext) -> Result<String> {
        let messages = vec![
            Message::system(self.system_prompt()),
            Message::user(Self::user_prompt(task, context)),
        ];
        let tools = self.tool_definitions();

        self.bus
            .publish(EventKind::AgentThinking {
                agent_id: self.config.id.clone(),
                available_tools: tools.len(),
            })
            .await;

        if tools.is_empty() {
            let response = self.provider.complete(self.request(messages)).await?;
            return Ok(response.content);
        }

        let offered: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let response = self
            .provider
            .complete_with_tools(ToolCompletionRequest::new(
                self.request(messages.clone()),
                tools.clone(),
            ))
            .await?;

        if !response.has_tool_calls() {
            return Ok(response.content.unwrap_or_default());
        }

        let names: Vec<String> = response.tool_calls.iter().map(|c| c.name.clone()).collect();
        self.bus
            .publish(EventKind::AgentToolCalls {
                agent_id: self.config.id.clone(),
                tool_calls: names,
            })
            .await;

        let runner = self
            .tools
            .as_ref()
            .ok_or_else(|| Error::Internal("tools offered without a runner".into()))?;

        let mut follow_up = messages;
        follow_up.push(Message::assistant_with_tool_calls(
            response.content.unwrap_or_default(),
            response.tool_calls.clone(),
        ));
        for call in &response.tool_calls {
            if !offered.contains(&call.name) {
                return Err(switchboard_tools::Error::NotFound(call.name.clone()).into());
            }
            let arguments = call.parse_arguments()?;
            debug!(agent_id = %self.config.id, tool = %call.name, "Invoking tool");
            let output = runner.run(&call.name, arguments).await?;
            follow_up.push(Message::tool_response_named(
                &call.id,
                &call.name,
                output.to_string(),
            ));
        }

        let final_response = self
            .provider
            .complete_with_tools(
                ToolCompletionRequest::new(self.request(follow_up), tools)
                    .with_tool_choice(ToolChoice::None),
            )
            .await?;
        Ok(final_response.content.unwrap_or_default())
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn role(&self) -> &str {
        &self.config.role
    }

    async fn execute(&self, task: &str, context: &AgentContext) -> AgentResult {
        self.bus
            .publish(EventKind::AgentStarted {
                agent_id: self.config.id.clone(),
                agent_name: self.config.name.clone(),
                task: task.to_string(),
            })
            .await;

        match self.run(task, context).await {
            Ok(result) => {
                debug!(agent_id = %self.config.id, "Agent completed");
                self.bus
                    .publish(EventKind::AgentCompleted {
                        agent_id: self.config.id.clone(),
                        result: result.clone(),
                    })
                    .await;
                AgentResult::success(&self.config.id, &self.config.name, result)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(agent_id = %self.config.id, error = %message, "Agent failed");
                self.bus
                    .publish(EventKind::AgentError {
                        agent_id: self.config.id.clone(),
                        error: message.clone(),
                    })
                    .await;
                AgentResult::failure(&self.config.id, &self.config.name, message)
            }
        }
    }
}
