use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::factory::BusBackend;
use super::types::{Event, EventKind};
use crate::error::Result;

/// Default capacity of the retention buffer
pub const DEFAULT_RETENTION: usize = 1000;

/// Subscriber callback.
///
/// An `Err` is logged by the bus; it never reaches the publisher and never
/// stops delivery to other subscribers.
pub type EventCallback = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Shared bus handle, created once at startup and passed to every component
pub type SharedEventBus = Arc<dyn EventBus>;

/// Wrap a closure as an [`EventCallback`]
pub fn callback<F>(f: F) -> EventCallback
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Publish/subscribe contract shared by every backend.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Which backend this is
    fn backend(&self) -> BusBackend;

    /// Assign id and timestamp, retain, and deliver to current subscribers.
    ///
    /// Never fails: a backend that cannot reach its broker keeps the event
    /// locally and logs the degraded condition.
    async fn publish(&self, kind: EventKind) -> Event;

    /// Deliver every event published after this call returns to `callback`
    /// until the returned subscription is released.
    async fn subscribe(&self, callback: EventCallback) -> Result<Subscription>;

    /// Snapshot of the retention buffer, oldest first
    fn event_queue(&self) -> Vec<Event>;

    /// Empty the retention buffer
    fn clear_queue(&self);

    /// Number of live subscriptions
    fn subscriber_count(&self) -> usize;
}

type Release = Box<dyn FnOnce() + Send>;

/// Handle for a live subscription.
///
/// Dropping the handle does not unsubscribe; long-lived listeners simply
/// keep it around.
#[must_use = "call unsubscribe() to stop delivery"]
pub struct Subscription {
    id: Uuid,
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub(crate) fn new(id: Uuid, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Subscription id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether `unsubscribe` has not been called yet
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop delivery and release backend resources. Idempotent.
    pub fn unsubscribe(&self) {
        let release = self
            .release
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(release) = release {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Bounded FIFO of recently published events; the oldest is evicted first.
///
/// Not synchronized on its own; each backend keeps it behind a lock.
#[derive(Debug, Clone)]
pub struct RetentionBuffer {
    events: VecDeque<Event>,
    capacity: usize,
}

impl Default for RetentionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl RetentionBuffer {
    /// Create a buffer holding at most `capacity` events (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_RETENTION)),
            capacity,
        }
    }

    /// Append an event, returning the evicted one on overflow
    pub fn push(&mut self, event: Event) -> Option<Event> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Copy of the contents, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of retained events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of retained events
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
