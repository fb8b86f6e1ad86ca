//! Tool lookup and invocation errors

use std::time::Duration;

use thiserror::Error;

/// Why a tool could not be registered or invoked
#[derive(Debug, Error)]
pub enum Error {
    /// No registered server declares this tool
    #[error("no server provides tool '{0}'")]
    NotFound(String),

    /// The registry points at a server that is no longer registered
    #[error("tool server '{0}' is not registered")]
    UnknownServer(String),

    /// Two servers declare the same tool name
    #[error("tool '{tool}' already owned by server '{owner}'")]
    DuplicateTool {
        /// Tool name
        tool: String,
        /// Server that registered it first
        owner: String,
    },

    /// Arguments rejected before or by the tool
    #[error("bad arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and reported a failure
    #[error("tool failed: {0}")]
    Failed(String),

    /// The tool did not finish within the runner's limit
    #[error("tool '{tool}' timed out after {limit:?}")]
    TimedOut {
        /// Tool name
        tool: String,
        /// Limit that elapsed
        limit: Duration,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
