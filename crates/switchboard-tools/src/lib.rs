//! Switchboard Tools - Tool Runner abstraction
//!
//! Tools are owned by named servers (an external subprocess, a remote
//! endpoint, or an in-process table). This crate provides:
//! - Registry: maps each tool name to its owning server
//! - Runner: resolves the owner and invokes the tool under a timeout
//! - Static server: an in-process server built from closures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod runner;
pub mod static_server;

pub use error::{Error, Result};
pub use registry::{ToolRegistry, ToolServer};
pub use runner::{RunnerConfig, ToolRunner};
pub use static_server::StaticToolServer;
