//! Mock completion provider for testing
//!
//! Replies are served from a FIFO queue shared by `complete` and
//! `complete_with_tools`, so a test scripts one conversation in call order.
//! An optional responder closure answers from the request contents instead,
//! which keeps tests deterministic when several tasks call concurrently.

use crate::completion::{
    CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;
use crate::tools::ToolCall;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain text answer
    Text(String),
    /// Tool invocations (only meaningful for `complete_with_tools`)
    ToolCalls(Vec<ToolCall>),
    /// Provider failure with the given message
    Fail(String),
}

type Responder = dyn Fn(&CompletionRequest) -> Option<MockReply> + Send + Sync;

/// A mock provider that returns queued replies or a default text.
pub struct MockProvider {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    responder: Option<Arc<Responder>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            responder: None,
        }
    }

    /// Answer from the request contents; falls back to the queue on `None`.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Option<MockReply> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Queue a text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(MockReply::Text(text.into()));
    }

    /// Queue a tool-call reply.
    pub fn push_tool_calls(&self, calls: Vec<ToolCall>) {
        self.push(MockReply::ToolCalls(calls));
    }

    /// Queue a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(MockReply::Fail(message.into()));
    }

    /// Queue any reply.
    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// All requests received so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self, request: &CompletionRequest) -> MockReply {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(reply) = self.responder.as_ref().and_then(|r| r(request)) {
            return reply;
        }
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| MockReply::Text("mock response".to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        match self.next_reply(&request) {
            MockReply::Text(content) => Ok(CompletionResponse {
                content,
                usage: None,
                finish_reason: Some("stop".to_string()),
                model: "mock-model".to_string(),
            }),
            MockReply::ToolCalls(_) => Err(Error::Malformed(
                "tool calls returned for a text-only request".to_string(),
            )),
            MockReply::Fail(message) => Err(Error::Failed(message)),
        }
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse> {
        let mut response = match self.next_reply(&request.request) {
            MockReply::Text(content) => ToolCompletionResponse::text(content),
            MockReply::ToolCalls(calls) => ToolCompletionResponse::with_calls(calls),
            MockReply::Fail(message) => return Err(Error::Failed(message)),
        };
        response.model = "mock-model".to_string();
        Ok(response)
    }
}
