//! Component bootstrap

use std::sync::Arc;

use anyhow::{Context, Result};
use switchboard_core::{
    create_event_bus, Agent, LlmAgent, Orchestrator, ReplyRouter, SharedEventBus, TaskStore,
};
use tracing::info;

use super::config::AppConfig;
use super::providers::resolve_llm_provider;
use super::tools::builtin_runner;

/// Everything a command needs
pub struct Runtime {
    pub bus: SharedEventBus,
    pub orchestrator: Arc<Orchestrator>,
}

/// Create the configured event bus
pub async fn connect_bus(config: &AppConfig) -> Result<SharedEventBus> {
    create_event_bus(&config.bus)
        .await
        .context("Failed to create event bus")
}

/// Wire the bus, completion provider, agents and orchestrator
pub async fn bootstrap(config: &AppConfig) -> Result<Runtime> {
    let bus = connect_bus(config).await?;
    let provider = resolve_llm_provider(&config.llm)?;
    let tools = builtin_runner()?;
    let replies = ReplyRouter::attach(bus.as_ref())
        .await
        .context("Failed to attach reply router")?;

    let mut builder = Orchestrator::builder(bus.clone(), provider.clone())
        .with_config(config.orchestrator.clone())
        .with_task_store(Arc::new(TaskStore::new()))
        .with_reply_router(replies.clone());

    for agent_config in &config.agents {
        let agent = LlmAgent::new(agent_config.clone(), bus.clone(), provider.clone())
            .with_tools(tools.clone())
            .with_replies(replies.clone())
            .with_question_timeout(config.orchestrator.clarification_timeout());
        info!(agent_id = %agent.id(), "Registered agent");
        builder = builder.with_agent(Arc::new(agent));
    }

    let orchestrator = builder.build().await.context("Failed to build orchestrator")?;
    Ok(Runtime { bus, orchestrator })
}
