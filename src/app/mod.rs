//! Application wiring
//!
//! # Module Structure
//!
//! - `config`: Configuration structures (`[bus]`, `[orchestrator]`, `[llm]`, `[[agents]]`)
//! - `loader`: Layered loading from embedded defaults, files and environment
//! - `providers`: Completion provider construction
//! - `tools`: Built-in tool servers
//! - `init`: Bus, agents and orchestrator bootstrap

pub mod config;
mod init;
mod loader;
mod providers;
mod tools;

pub use init::{bootstrap, connect_bus, Runtime};
pub use loader::load_config;
