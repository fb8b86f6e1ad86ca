//! Switchboard Core - Coordination Engine
//!
//! This crate provides the coordination logic for Switchboard:
//! - Event bus: pluggable publish/subscribe with in-memory and Redis backends
//! - Task store: concurrent task state for out-of-band status polling
//! - Agents: the execution contract every delegate implements
//! - Orchestrator: plan, delegate, synthesize, with clarification rounds
//! - Utils: retry and backoff

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod error;
pub mod event_bus;
pub mod orchestrator;
pub mod task_store;
pub mod utils;

pub use agents::{
    Agent, AgentContext, AgentDescriptor, AgentResult, LlmAgent, LlmAgentConfig, PendingReply,
    ReplyKey, ReplyRouter,
};
pub use error::{Error, Result};
pub use event_bus::{
    callback, create_event_bus, BusBackend, BusConfig, Event, EventBus, EventCallback, EventKind,
    MemoryEventBus, RedisEventBus, SharedEventBus, Subscription,
};
pub use orchestrator::{
    parse_plan, Orchestrator, OrchestratorBuilder, OrchestratorConfig, Plan, PlanStep,
    ORCHESTRATOR_ID,
};
pub use task_store::{Clarification, StepOutcome, Task, TaskOutcome, TaskStatus, TaskStore};
