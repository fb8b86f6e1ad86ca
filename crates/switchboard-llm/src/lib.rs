//! Switchboard LLM - Completion Service abstraction
//!
//! This crate provides the completion capability used by agents and the
//! orchestrator:
//! - Provider: the `LlmProvider` trait (prompt + tool schema in, text and
//!   optional tool invocations out)
//! - OpenAI-compatible: a `reqwest`-based provider for any
//!   `/chat/completions` endpoint
//! - Mock: a queue-driven provider for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod openai_compat;
pub mod provider;
pub mod tools;
pub mod util;

pub use completion::{
    CompletionRequest, CompletionResponse, TokenUsage, ToolCompletionRequest,
    ToolCompletionResponse,
};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::{MockProvider, MockReply};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::{LlmProvider, SharedLlmProvider};
pub use tools::{ToolCall, ToolChoice, ToolDefinition};
