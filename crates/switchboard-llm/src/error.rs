//! Completion errors

use std::time::Duration;

use thiserror::Error;

/// Why a completion did not produce a usable reply
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP client could not be built from the configuration
    #[error("cannot build completion client: {0}")]
    Client(String),

    /// The endpoint answered with a non-success status
    #[error("completion endpoint returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Sanitized response body
        message: String,
    },

    /// HTTP 429
    #[error("completion endpoint is rate limiting requests")]
    RateLimited,

    /// The endpoint could not be reached
    #[error("completion endpoint unreachable: {0}")]
    Transport(String),

    /// No reply within the request timeout
    #[error("completion timed out after {0:?}")]
    TimedOut(Duration),

    /// A reply arrived but could not be interpreted
    #[error("unusable completion reply: {0}")]
    Malformed(String),

    /// The provider reported a failure of its own
    #[error("completion failed: {0}")]
    Failed(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_includes_code() {
        let err = Error::Status {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "completion endpoint returned 503: overloaded");
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::TimedOut(Duration::from_secs(60));
        assert_eq!(err.to_string(), "completion timed out after 60s");
    }
}
