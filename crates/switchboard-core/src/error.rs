//! Error types for switchboard-core

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::task_store::TaskStatus;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Event bus failure (subscription setup, closed bus)
    #[error("event bus error: {0}")]
    Bus(String),

    /// Redis transport failure
    #[error("redis error: {0}")]
    Redis(String),

    /// Unknown task id
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// Task status change not allowed by the state machine
    #[error("invalid task transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: TaskStatus,
        /// Requested status
        to: TaskStatus,
    },

    /// Planning failed
    #[error("planning error: {0}")]
    Planning(String),

    /// Someone is already waiting for a reply on this key
    #[error("a reply is already awaited for '{0}'")]
    ClarificationInFlight(String),

    /// No reply arrived in time
    #[error("no answer for '{key}' within {limit:?}")]
    ClarificationTimeout {
        /// Correlation key (task id or agent id)
        key: String,
        /// Timeout that elapsed
        limit: Duration,
    },

    /// Too many clarification rounds for one task
    #[error("clarification limit of {0} rounds exceeded")]
    ClarificationLimit(u32),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] switchboard_llm::Error),

    /// Tool execution error
    #[error("tool error: {0}")]
    Tool(#[from] switchboard_tools::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Redis(e.to_string())
    }
}

impl Error {
    /// Whether the error is a broker connectivity problem worth retrying
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Redis(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
