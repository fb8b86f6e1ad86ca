//! Runner - resolves a tool's owning server and invokes it under a timeout

use crate::error::{Error, Result};
use crate::registry::ToolRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchboard_llm::ToolDefinition;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Configuration for the tool runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Timeout applied to every invocation
    pub default_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl RunnerConfig {
    /// Set the default timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Tool runner
#[derive(Clone)]
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    config: RunnerConfig,
}

impl ToolRunner {
    /// Create a new tool runner
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, RunnerConfig::default())
    }

    /// Get the registry
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Tool schemas offered by the given servers (all servers if empty)
    #[must_use]
    pub fn definitions_for(&self, servers: &[String]) -> Vec<ToolDefinition> {
        self.registry.definitions_for(servers)
    }

    /// Run a tool by name.
    ///
    /// Arguments must be a JSON object; the owning server is looked up from
    /// the registry.
    #[instrument(skip(self, arguments), fields(tool = %tool_name))]
    pub async fn run(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if !arguments.is_object() {
            return Err(Error::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object",
                tool_name
            )));
        }

        let server = self.registry.resolve(tool_name)?;
        let limit = self.config.default_timeout;
        let start = Instant::now();
        debug!(server = %server.name(), timeout_ms = %limit.as_millis(), "Running tool");

        match timeout(limit, server.call(tool_name, arguments)).await {
            Ok(Ok(output)) => {
                debug!(duration_ms = %start.elapsed().as_millis(), "Tool completed");
                Ok(output)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Tool failed");
                Err(e)
            }
            Err(_) => {
                warn!(timeout_ms = %limit.as_millis(), "Tool timed out");
                Err(Error::TimedOut {
                    tool: tool_name.to_string(),
                    limit,
                })
            }
        }
    }
}
