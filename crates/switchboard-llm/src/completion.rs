//! What goes into a completion and what comes back

use crate::message::{Message, MessageRole};
use crate::tools::{ToolCall, ToolChoice, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Tokens billed for one completion, as reported by the endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt messages
    pub prompt_tokens: u32,
    /// Tokens in the reply
    pub completion_tokens: u32,
    /// Sum reported by the endpoint
    pub total_tokens: u32,
}

/// A prompt for the completion service.
///
/// `model` left empty lets the provider pick its configured default.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Provider-specific model name
    pub model: String,
    /// Conversation so far, system prompt first
    pub messages: Vec<Message>,
    /// Reply token cap
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Prompt for the provider's default model
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Override the provider's default model
    #[must_use]
    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self
        }
    }

    /// Cap the reply length
    #[must_use]
    pub fn with_max_tokens(self, limit: u32) -> Self {
        Self {
            max_tokens: Some(limit),
            ..self
        }
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..self
        }
    }

    /// Content of the most recent user turn. Agents put the task and its
    /// context there, so this is what tests usually inspect.
    #[must_use]
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .map(|message| message.content.as_str())
    }
}

/// Text reply to a [`CompletionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Reply text
    pub content: String,
    /// Billing, when the endpoint reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped (`stop`, `length`, ...)
    pub finish_reason: Option<String>,
    /// Model that actually answered
    pub model: String,
}

/// A prompt plus the tools the model may ask to invoke
#[derive(Debug, Clone)]
pub struct ToolCompletionRequest {
    /// Prompt and sampling settings
    pub request: CompletionRequest,
    /// Offered tool schemas
    pub tools: Vec<ToolDefinition>,
    /// Whether the model may, must, or must not call a tool
    pub tool_choice: ToolChoice,
}

impl ToolCompletionRequest {
    /// Offer `tools` and let the model decide whether to use them
    #[must_use]
    pub fn new(request: CompletionRequest, tools: Vec<ToolDefinition>) -> Self {
        Self {
            request,
            tools,
            tool_choice: ToolChoice::Auto,
        }
    }

    /// Override the tool choice strategy
    #[must_use]
    pub fn with_tool_choice(self, tool_choice: ToolChoice) -> Self {
        Self {
            tool_choice,
            ..self
        }
    }
}

/// Reply to a [`ToolCompletionRequest`]: text, tool invocations, or both
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCompletionResponse {
    /// Reply text, often absent when tools are called
    pub content: Option<String>,
    /// Invocations the model asked for, in order
    pub tool_calls: Vec<ToolCall>,
    /// Billing, when the endpoint reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
    /// Model that actually answered
    pub model: String,
}

impl ToolCompletionResponse {
    fn unbilled(content: Option<String>, tool_calls: Vec<ToolCall>, finish: &str) -> Self {
        Self {
            content,
            tool_calls,
            usage: None,
            finish_reason: Some(finish.to_string()),
            model: String::new(),
        }
    }

    /// A final answer with no tool calls
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::unbilled(Some(content.into()), Vec::new(), "stop")
    }

    /// A reply that only requests tool invocations
    #[must_use]
    pub fn with_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::unbilled(None, tool_calls, "tool_calls")
    }

    /// Whether the model asked for at least one tool
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_settings_and_last_user_turn() {
        let request = CompletionRequest::new(vec![
            Message::system("You plan work"),
            Message::user("first draft"),
            Message::assistant_with_tool_calls("", Vec::new()),
            Message::user("second draft"),
            Message::tool_response("call_1", "none"),
        ])
        .with_model("gpt-4o-mini")
        .with_max_tokens(256)
        .with_temperature(0.2);

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.last_user_content(), Some("second draft"));
    }

    #[test]
    fn test_default_model_is_empty() {
        let request = CompletionRequest::new(vec![Message::system("only system")]);
        assert!(request.model.is_empty());
        assert_eq!(request.last_user_content(), None);
    }

    #[test]
    fn test_tool_response_constructors() {
        let calls = ToolCompletionResponse::with_calls(vec![ToolCall {
            id: "call_1".to_string(),
            name: "current_time".to_string(),
            arguments: "{}".to_string(),
        }]);
        assert!(calls.has_tool_calls());
        assert!(calls.content.is_none());
        assert_eq!(calls.finish_reason.as_deref(), Some("tool_calls"));

        let forced = ToolCompletionRequest::new(CompletionRequest::default(), Vec::new())
            .with_tool_choice(ToolChoice::None);
        assert_eq!(forced.tool_choice, ToolChoice::None);

        let text = ToolCompletionResponse::text("done");
        assert!(!text.has_tool_calls());
        assert_eq!(text.content.as_deref(), Some("done"));
    }
}
