//! OpenAI-compatible provider
//!
//! Talks to any endpoint implementing `POST {base_url}/chat/completions`
//! (OpenAI, Groq, OpenRouter, Ollama's compatibility layer, vLLM, ...).

use crate::completion::{
    CompletionRequest, CompletionResponse, TokenUsage, ToolCompletionRequest,
    ToolCompletionResponse,
};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::LlmProvider;
use crate::tools::{ToolCall, ToolChoice, ToolDefinition};
use crate::util::{mask_api_key, sanitize_api_error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Provider configuration
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// API key (may be empty for local endpoints)
    pub api_key: String,
    /// Base URL without the trailing `/chat/completions`
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiCompatConfig {
    /// Create a configuration with an API key and the default endpoint
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatRequestToolCall<'a>>,
}

#[derive(Serialize)]
struct ChatRequestToolCall<'a> {
    id: &'a str,
    r#type: &'static str,
    function: ChatRequestFunction<'a>,
}

#[derive(Serialize)]
struct ChatRequestFunction<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct ChatTool<'a> {
    r#type: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatToolCallFunction,
}

#[derive(Deserialize)]
struct ChatToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl OpenAiCompatProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Convert a message to the wire shape. An assistant turn that only
    /// requests tools is sent with `content: null`.
    fn convert_message(message: &Message) -> ChatMessage<'_> {
        let content = if message.content.is_empty() && !message.tool_calls.is_empty() {
            None
        } else {
            Some(message.content.as_str())
        };

        ChatMessage {
            role: message.role.as_str(),
            content,
            tool_call_id: message.tool_call_id.as_deref(),
            name: message.name.as_deref(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| ChatRequestToolCall {
                    id: &call.id,
                    r#type: "function",
                    function: ChatRequestFunction {
                        name: &call.name,
                        arguments: &call.arguments,
                    },
                })
                .collect(),
        }
    }

    fn tool_choice(choice: &ToolChoice) -> &'static str {
        match choice {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
            ToolChoice::Required => "required",
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<(ChatChoice, Option<TokenUsage>, String)> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::TimedOut(self.config.timeout)
            } else {
                Error::Transport(sanitize_api_error(&e.to_string()))
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message: sanitize_api_error(&body),
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Malformed(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Malformed("reply has no choices".to_string()))?;

        Ok((choice, chat_response.usage, chat_response.model))
    }

    fn model_for<'a>(&'a self, request: &'a CompletionRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %self.model_for(&request)))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: self.model_for(&request),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: None,
            tool_choice: None,
        };

        debug!("Sending completion request");
        let (choice, usage, model) = self.send(&body).await?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            finish_reason: choice.finish_reason,
            model,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.model_for(&request.request), tools = request.tools.len()))]
    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse> {
        let tools: Vec<ChatTool<'_>> = request
            .tools
            .iter()
            .map(|function| ChatTool {
                r#type: "function",
                function,
            })
            .collect();

        let body = ChatRequest {
            model: self.model_for(&request.request),
            messages: request
                .request
                .messages
                .iter()
                .map(Self::convert_message)
                .collect(),
            max_tokens: request.request.max_tokens,
            temperature: request.request.temperature,
            tool_choice: (!tools.is_empty()).then(|| Self::tool_choice(&request.tool_choice)),
            tools: (!tools.is_empty()).then_some(tools),
        };

        debug!("Sending tool completion request");
        let (choice, usage, model) = self.send(&body).await?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ToolCompletionResponse {
            content: choice.message.content,
            tool_calls,
            usage,
            finish_reason: choice.finish_reason,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OpenAiCompatConfig::new("test-key")
            .with_base_url("http://localhost:11434/v1/")
            .with_model("llama3.2")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.default_model, "llama3.2");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = OpenAiCompatConfig::new("sk-1234567890abcdefghijklmnop");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("1234567890abcdefghijkl"));
    }

    #[test]
    fn test_request_serialization_shape() {
        let messages = vec![Message::user("hi")];
        let def = ToolDefinition::new("lookup", "Look up", serde_json::json!({"type": "object"}));
        let body = ChatRequest {
            model: "m",
            messages: messages.iter().map(OpenAiCompatProvider::convert_message).collect(),
            max_tokens: None,
            temperature: Some(0.1),
            tools: Some(vec![ChatTool {
                r#type: "function",
                function: &def,
            }]),
            tool_choice: Some("auto"),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "lookup");
        assert_eq!(json["tool_choice"], "auto");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_tool_turns_serialize_with_call_ids() {
        let call = ToolCall {
            id: "c1".to_string(),
            name: "lookup".to_string(),
            arguments: r#"{"q":1}"#.to_string(),
        };
        let messages = vec![
            Message::user("find it"),
            Message::assistant_with_tool_calls("", vec![call]),
            Message::tool_response_named("c1", "lookup", r#"{"found":true}"#),
        ];
        let body = ChatRequest {
            model: "m",
            messages: messages.iter().map(OpenAiCompatProvider::convert_message).collect(),
            max_tokens: None,
            temperature: None,
            tools: None,
            tool_choice: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        let wire = json["messages"].as_array().unwrap();
        assert_eq!(wire[0]["content"], "find it");
        assert!(wire[0].get("tool_calls").is_none());

        assert_eq!(wire[1]["role"], "assistant");
        assert!(wire[1]["content"].is_null());
        assert_eq!(wire[1]["tool_calls"][0]["id"], "c1");
        assert_eq!(wire[1]["tool_calls"][0]["type"], "function");
        assert_eq!(wire[1]["tool_calls"][0]["function"]["name"], "lookup");
        assert_eq!(wire[1]["tool_calls"][0]["function"]["arguments"], r#"{"q":1}"#);

        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[2]["tool_call_id"], "c1");
        assert_eq!(wire[2]["name"], "lookup");
        assert_eq!(wire[2]["content"], r#"{"found":true}"#);
    }

    #[test]
    fn test_response_parsing_with_tool_calls() {
        let raw = r#"{
            "model": "m",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{"id": "c1", "type": "function",
                        "function": {"name": "lookup", "arguments": "{\"q\":1}"}}]
                }
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let choice = &parsed.choices[0];
        assert!(choice.message.content.is_none());
        assert_eq!(choice.message.tool_calls[0].function.name, "lookup");
    }
}
