//! Registry - tool servers and tool ownership
//!
//! Every tool is declared by exactly one [`ToolServer`]. The registry keeps
//! the servers by name and an index from tool name to owning server, which
//! is how the runner finds where to send an invocation.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use switchboard_llm::ToolDefinition;
use tracing::debug;

/// A named provider of tools
#[async_trait::async_trait]
pub trait ToolServer: Send + Sync {
    /// Server name, unique within a registry
    fn name(&self) -> &str;

    /// Tools this server declares
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Invoke one of this server's tools
    async fn call(&self, tool: &str, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

/// Registry of tool servers
#[derive(Default)]
pub struct ToolRegistry {
    servers: HashMap<String, Arc<dyn ToolServer>>,
    /// tool name -> (owning server, definition); ordered for stable schemas
    tools: BTreeMap<String, (String, ToolDefinition)>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server and index the tools it declares.
    ///
    /// Registering a name again replaces that server and its whole tool set.
    /// Fails without registering anything if one of its tools is already
    /// owned by another server.
    pub fn register_server(&mut self, server: Arc<dyn ToolServer>) -> Result<()> {
        let server_name = server.name().to_string();
        let definitions = server.tools();

        if let Some((tool, owner)) = definitions.iter().find_map(|def| {
            self.tools
                .get(&def.name)
                .filter(|(owner, _)| *owner != server_name)
                .map(|(owner, _)| (def.name.clone(), owner.clone()))
        }) {
            return Err(Error::DuplicateTool { tool, owner });
        }

        if self.servers.contains_key(&server_name) {
            debug!(server = %server_name, "Replacing tool server");
            self.tools.retain(|_, (owner, _)| *owner != server_name);
        }
        for def in definitions {
            debug!(server = %server_name, tool = %def.name, "Registering tool");
            self.tools
                .insert(def.name.clone(), (server_name.clone(), def));
        }
        self.servers.insert(server_name, server);
        Ok(())
    }

    /// Server that owns `tool`
    #[must_use]
    pub fn owner_of(&self, tool: &str) -> Option<&str> {
        self.tools.get(tool).map(|(owner, _)| owner.as_str())
    }

    /// Get a server by name
    #[must_use]
    pub fn server(&self, name: &str) -> Option<Arc<dyn ToolServer>> {
        self.servers.get(name).cloned()
    }

    /// Resolve the server owning `tool`
    pub fn resolve(&self, tool: &str) -> Result<Arc<dyn ToolServer>> {
        let owner = self
            .owner_of(tool)
            .ok_or_else(|| Error::NotFound(tool.to_string()))?;
        self.server(owner)
            .ok_or_else(|| Error::UnknownServer(owner.to_string()))
    }

    /// Definitions of every tool owned by one of `servers`.
    ///
    /// An empty slice selects all servers.
    #[must_use]
    pub fn definitions_for(&self, servers: &[String]) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .filter(|(owner, _)| servers.is_empty() || servers.iter().any(|s| s == owner))
            .map(|(_, def)| def.clone())
            .collect()
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
