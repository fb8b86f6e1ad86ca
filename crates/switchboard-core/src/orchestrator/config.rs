//! Orchestrator configuration (`[orchestrator]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Clarification rounds allowed per task before failing it
    #[serde(default = "default_max_clarification_rounds")]
    pub max_clarification_rounds: u32,
    /// How long a task waits for a clarification answer, in milliseconds
    #[serde(default = "default_clarification_timeout_ms")]
    pub clarification_timeout_ms: u64,
    /// Temperature for the planning call
    #[serde(default = "default_planning_temperature")]
    pub planning_temperature: f32,
    /// Token cap for the synthesis call
    #[serde(default)]
    pub synthesis_max_tokens: Option<u32>,
}

fn default_max_clarification_rounds() -> u32 {
    3
}

fn default_clarification_timeout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_planning_temperature() -> f32 {
    0.2
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_clarification_rounds: default_max_clarification_rounds(),
            clarification_timeout_ms: default_clarification_timeout_ms(),
            planning_temperature: default_planning_temperature(),
            synthesis_max_tokens: None,
        }
    }
}

impl OrchestratorConfig {
    /// Set the clarification round cap
    #[must_use]
    pub fn with_max_clarification_rounds(mut self, rounds: u32) -> Self {
        self.max_clarification_rounds = rounds;
        self
    }

    /// Set the clarification wait
    #[must_use]
    pub fn with_clarification_timeout(mut self, timeout: Duration) -> Self {
        self.clarification_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Clarification wait as a `Duration`
    #[must_use]
    pub fn clarification_timeout(&self) -> Duration {
        Duration::from_millis(self.clarification_timeout_ms)
    }
}
