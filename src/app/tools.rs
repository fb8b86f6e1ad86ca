//! Built-in tool servers

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use switchboard_llm::ToolDefinition;
use switchboard_tools::{StaticToolServer, ToolRegistry, ToolRunner};

/// Registry with the in-process `clock` server
pub fn builtin_runner() -> Result<Arc<ToolRunner>> {
    let clock = StaticToolServer::new("clock").with_tool(
        ToolDefinition::new(
            "current_time",
            "Current date and time in UTC (RFC 3339)",
            json!({"type": "object", "properties": {}}),
        ),
        |_| Ok(json!({ "utc": Utc::now().to_rfc3339() })),
    );

    let mut registry = ToolRegistry::new();
    registry.register_server(Arc::new(clock))?;
    Ok(Arc::new(ToolRunner::with_defaults(Arc::new(registry))))
}
