//! `switchboard answer` and `switchboard answer-agent`
//!
//! Answers travel over the bus, so they reach waiters in other processes
//! only with the redis backend.

use anyhow::Result;
use switchboard_core::{BusBackend, EventBus, EventKind};
use tracing::warn;
use uuid::Uuid;

use crate::app::{config::AppConfig, connect_bus};

pub async fn task(config: &AppConfig, task_id: Uuid, answer: String) -> Result<()> {
    publish(config, EventKind::TaskClarificationAnswer { task_id, answer }).await
}

pub async fn agent(config: &AppConfig, agent_id: String, answer: String) -> Result<()> {
    publish(config, EventKind::AgentAnswer { agent_id, answer }).await
}

async fn publish(config: &AppConfig, kind: EventKind) -> Result<()> {
    if config.bus.backend == BusBackend::Memory {
        warn!("memory backend: the answer is only visible inside this process");
    }

    let bus = connect_bus(config).await?;
    let event = bus.publish(kind).await;
    println!("{}", serde_json::to_string(&event)?);
    Ok(())
}
