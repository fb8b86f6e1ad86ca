//! In-process tool server backed by closures

use crate::error::{Error, Result};
use crate::registry::ToolServer;
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_llm::ToolDefinition;

type Handler = dyn Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync;

/// A tool server whose tools are plain functions
pub struct StaticToolServer {
    name: String,
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<Handler>>,
}

impl StaticToolServer {
    /// Create an empty server
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Add a tool
    #[must_use]
    pub fn with_tool<F>(mut self, definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.handlers
            .insert(definition.name.clone(), Arc::new(handler));
        self.definitions.push(definition);
        self
    }
}

#[async_trait::async_trait]
impl ToolServer for StaticToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }

    async fn call(&self, tool: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let handler = self
            .handlers
            .get(tool)
            .ok_or_else(|| Error::NotFound(tool.to_string()))?;
        handler(arguments)
    }
}
