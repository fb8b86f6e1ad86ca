//! Tool schema and invocation types for function calling.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tool schema offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as a JSON string, exactly as the model produced them
    pub arguments: String,
}

impl ToolCall {
    /// Parse the raw argument string as JSON.
    ///
    /// An empty string is treated as an empty object; anything else that is
    /// not valid JSON is an [`Error::Malformed`].
    pub fn parse_arguments(&self) -> Result<serde_json::Value> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments).map_err(|e| {
            Error::Malformed(format!("malformed arguments for '{}': {}", self.name, e))
        })
    }
}

/// Tool choice strategy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Let the model decide
    #[default]
    Auto,
    /// Don't use tools
    None,
    /// Force a tool call
    Required,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "search".to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_parse_arguments() {
        let args = call(r#"{"query": "rust"}"#).parse_arguments().unwrap();
        assert_eq!(args["query"], "rust");
    }

    #[test]
    fn test_parse_empty_arguments() {
        assert_eq!(call("  ").parse_arguments().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_parse_malformed_arguments() {
        let err = call("{query: ").parse_arguments().unwrap_err();
        assert!(err.to_string().contains("malformed arguments for 'search'"));
    }
}
