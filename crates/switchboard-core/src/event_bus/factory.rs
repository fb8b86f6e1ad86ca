use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::bus::{SharedEventBus, DEFAULT_RETENTION};
use super::memory::MemoryEventBus;
use super::redis_bus::{RedisBusConfig, RedisEventBus};
use crate::error::{Error, Result};

/// Event bus backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    /// In-process, synchronous fan-out (default)
    #[default]
    Memory,
    /// Redis Streams, visible across processes
    Redis,
}

impl fmt::Display for BusBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

impl FromStr for BusBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(Error::Configuration(format!(
                "unknown bus backend '{}' (expected 'memory' or 'redis')",
                other
            ))),
        }
    }
}

/// Event bus configuration (`[bus]` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: BusBackend,
    /// Broker URL, required for the redis backend
    #[serde(default)]
    pub url: Option<String>,
    /// Stream key standing in for the fanout exchange
    #[serde(default = "default_stream_key")]
    pub stream_key: String,
    /// Retention buffer capacity
    #[serde(default = "default_retention")]
    pub retention: usize,
    /// Approximate stream length cap (`XADD MAXLEN ~`)
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: usize,
    /// Consumer poll interval when the stream is idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-command timeout against the broker
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// First reconnect delay
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Reconnect delay cap
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

fn default_stream_key() -> String {
    "switchboard:events".to_string()
}

fn default_retention() -> usize {
    DEFAULT_RETENTION
}

fn default_stream_max_len() -> usize {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_publish_timeout_ms() -> u64 {
    2000
}

fn default_reconnect_initial_delay_ms() -> u64 {
    500
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::Memory,
            url: None,
            stream_key: default_stream_key(),
            retention: default_retention(),
            stream_max_len: default_stream_max_len(),
            poll_interval_ms: default_poll_interval_ms(),
            publish_timeout_ms: default_publish_timeout_ms(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

impl BusConfig {
    /// Redis backend with the given URL and default tuning
    #[must_use]
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: BusBackend::Redis,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Settings for the Redis backend.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no URL is set
    pub fn redis_settings(&self) -> Result<RedisBusConfig> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::Configuration("bus.url is required for the redis backend".into()))?;

        Ok(RedisBusConfig {
            url: url.to_string(),
            stream_key: self.stream_key.clone(),
            retention: self.retention,
            stream_max_len: self.stream_max_len,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            command_timeout: Duration::from_millis(self.publish_timeout_ms.max(1)),
            reconnect_initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
            reconnect_max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            ..RedisBusConfig::default()
        })
    }
}

/// Build the process-wide bus handle for the configured backend.
///
/// # Errors
///
/// Returns a configuration error for an incomplete redis setup. An
/// unreachable broker is not an error: the redis bus starts degraded and
/// reconnects in the background.
pub async fn create_event_bus(config: &BusConfig) -> Result<SharedEventBus> {
    match config.backend {
        BusBackend::Memory => {
            info!(retention = config.retention, "Using in-memory event bus");
            Ok(Arc::new(MemoryEventBus::new(config.retention)))
        }
        BusBackend::Redis => {
            let settings = config.redis_settings()?;
            info!(stream = %settings.stream_key, "Using Redis event bus");
            let bus = RedisEventBus::connect(settings).await?;
            Ok(Arc::new(bus))
        }
    }
}
