//! Conversation messages sent to a completion service.

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model
    System,
    /// Caller input
    User,
    /// Model output
    Assistant,
    /// Output of a tool the model invoked
    Tool,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author role
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Call this message answers (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced the content (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Invocations the assistant asked for in this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Assistant turn that requested `tool_calls`. It must precede the
    /// tool responses answering those calls.
    #[must_use]
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    /// Create a tool response message
    #[must_use]
    pub fn tool_response(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }

    /// Tool response that also names the tool
    #[must_use]
    pub fn tool_response_named(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(tool_name.into()),
            ..Self::tool_response(tool_call_id, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("rules").role, MessageRole::System);
        assert_eq!(Message::user("hi").role, MessageRole::User);

        let reply = Message::assistant("hello");
        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.content, "hello");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::user("x")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"x"}"#);
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
        assert_eq!(MessageRole::Tool.as_str(), "tool");
    }

    #[test]
    fn test_tool_turns_carry_call_ids() {
        let call = ToolCall {
            id: "call_7".to_string(),
            name: "add".to_string(),
            arguments: r#"{"a":1}"#.to_string(),
        };
        let request = Message::assistant_with_tool_calls("", vec![call.clone()]);
        assert_eq!(request.role, MessageRole::Assistant);
        assert_eq!(request.tool_calls, vec![call]);

        let answer = Message::tool_response_named("call_7", "add", r#"{"sum":1}"#);
        assert_eq!(answer.role, MessageRole::Tool);
        assert_eq!(answer.tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(answer.name.as_deref(), Some("add"));

        let json = serde_json::to_value(&Message::tool_response("call_7", "ok")).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_7");
        assert!(json.get("name").is_none());
    }
}
