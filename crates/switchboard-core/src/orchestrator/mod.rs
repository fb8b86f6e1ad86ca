//! Orchestrator - plan, delegate, synthesize
//!
//! # Module Structure
//!
//! - `config`: `OrchestratorConfig`
//! - `core`: `Orchestrator`, its builder, and its own `Agent` impl (planning)
//! - `planning`: plan types and tolerant parsing of planner output
//! - `process`: the per-task state machine and clarification rounds
//! - `delegation`: sequential step execution with dependency resolution
//! - `synthesis`: the final completion over all step results

mod config;
mod core;
mod delegation;
mod planning;
mod process;
mod synthesis;

#[cfg(test)]
mod tests;

pub use config::OrchestratorConfig;
pub use core::{Orchestrator, OrchestratorBuilder, ORCHESTRATOR_ID};
pub use planning::{parse_plan, Plan, PlanStep};
