//! Utility modules for switchboard-core
//!
//! - retry: Exponential backoff for broker connections

mod retry;

pub use retry::{retry, Backoff, GaveUp};
