//! Agents - the execution contract every delegate implements
//!
//! - `agent`: the [`Agent`] trait, its context and result types
//! - `llm_agent`: the standard completion-backed agent with tool support
//! - `replies`: bus-mediated request/response (clarification answers)

mod agent;
mod llm_agent;
mod replies;

pub use agent::{Agent, AgentContext, AgentDescriptor, AgentResult};
pub use llm_agent::{LlmAgent, LlmAgentConfig};
pub use replies::{PendingReply, ReplyKey, ReplyRouter};
