//! Completion Service trait
//!
//! Every backend the agents talk to implements [`LlmProvider`]. Retries and
//! model selection belong to the implementation, not to callers.

use crate::completion::{
    CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
};
use crate::error::Result;
use std::sync::Arc;

/// Trait for completion providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Complete a conversation (text only)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Complete a conversation with a tool schema
    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse>;
}

/// Shared provider handle
pub type SharedLlmProvider = Arc<dyn LlmProvider>;
