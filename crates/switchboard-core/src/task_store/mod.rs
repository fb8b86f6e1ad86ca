//! Task store - concurrent task state for out-of-band polling
//!
//! The orchestrator is the only writer of status, result, error and
//! clarification; callers may read snapshots and append answers.

mod store;
mod types;

pub use store::TaskStore;
pub use types::{Clarification, StepOutcome, Task, TaskOutcome, TaskStatus};

#[cfg(test)]
mod tests;
