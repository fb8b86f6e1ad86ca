//! EventBus - publish/subscribe channel for lifecycle events.
//!
//! Everything the orchestrator and agents do is announced here. Two backends
//! share one contract: an in-process bus that fans out synchronously, and a
//! Redis Streams bus visible across processes.

/// Bus trait, subscription handle and retention buffer.
pub mod bus;
/// Backend selection.
pub mod factory;
/// Volatile in-process backend.
pub mod memory;
/// Durable Redis Streams backend.
pub mod redis_bus;
/// Event type definitions.
pub mod types;

pub use bus::{
    callback, EventBus, EventCallback, RetentionBuffer, SharedEventBus, Subscription,
    DEFAULT_RETENTION,
};
pub use factory::{create_event_bus, BusBackend, BusConfig};
pub use memory::MemoryEventBus;
pub use redis_bus::{RedisBusConfig, RedisEventBus};
pub use types::{Event, EventKind};
