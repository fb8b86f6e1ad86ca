use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use super::bus::{EventBus, EventCallback, RetentionBuffer, Subscription};
use super::factory::BusBackend;
use super::types::{Event, EventKind};
use crate::error::Result;

struct Subscriber {
    id: Uuid,
    active: Arc<AtomicBool>,
    callback: EventCallback,
}

type Target = (Uuid, Arc<AtomicBool>, EventCallback);

/// An appended event and the subscribers it goes to
struct Dispatch {
    event: Event,
    targets: Vec<Target>,
}

struct State {
    queue: RetentionBuffer,
    subscribers: Vec<Subscriber>,
    /// Appended but not yet delivered, in append order
    pending: VecDeque<Dispatch>,
    /// Some publisher is draining `pending`
    dispatching: bool,
}

/// Volatile in-process event bus.
///
/// Publishing appends to the retention buffer, snapshots the subscriber
/// list and queues the delivery under one lock. A subscriber therefore sees
/// exactly the events whose publish took the lock after its `subscribe`,
/// in retention order.
///
/// Callbacks run synchronously on a publisher's task. The publisher that
/// finds nobody delivering drains the queue until it is empty; a publisher
/// that finds a delivery in progress (another task, or a callback
/// publishing from inside delivery) leaves its event to that drain and
/// returns.
#[derive(Clone)]
pub struct MemoryEventBus {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(super::bus::DEFAULT_RETENTION)
    }
}

impl MemoryEventBus {
    /// Create a bus retaining at most `retention` events
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                queue: RetentionBuffer::new(retention),
                subscribers: Vec::new(),
                pending: VecDeque::new(),
                dispatching: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn drain(&self) {
        let _release = DrainGuard(self);
        loop {
            let next = {
                let mut state = self.lock();
                match state.pending.pop_front() {
                    Some(dispatch) => dispatch,
                    None => {
                        state.dispatching = false;
                        return;
                    }
                }
            };
            deliver(next);
        }
    }
}

/// Hands the drain back if a callback panics mid-delivery
struct DrainGuard<'a>(&'a MemoryEventBus);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().dispatching = false;
        }
    }
}

fn deliver(dispatch: Dispatch) {
    let Dispatch { event, targets } = dispatch;
    for (id, active, callback) in targets {
        if !active.load(Ordering::Acquire) {
            continue;
        }
        if let Err(e) = callback(&event) {
            warn!(
                subscription = %id,
                event_type = event.event_type(),
                error = %e,
                "Subscriber callback failed"
            );
        }
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    fn backend(&self) -> BusBackend {
        BusBackend::Memory
    }

    async fn publish(&self, kind: EventKind) -> Event {
        let event = Event::new(kind);

        let lead = {
            let mut state = self.lock();
            state.queue.push(event.clone());
            let targets = state
                .subscribers
                .iter()
                .map(|s| (s.id, s.active.clone(), s.callback.clone()))
                .collect();
            state.pending.push_back(Dispatch {
                event: event.clone(),
                targets,
            });
            !std::mem::replace(&mut state.dispatching, true)
        };

        if lead {
            self.drain();
        }
        event
    }

    async fn subscribe(&self, callback: EventCallback) -> Result<Subscription> {
        let id = Uuid::new_v4();
        let active = Arc::new(AtomicBool::new(true));

        self.lock().subscribers.push(Subscriber {
            id,
            active: active.clone(),
            callback,
        });
        debug!(subscription = %id, "Subscribed to in-memory bus");

        let state = Arc::downgrade(&self.state);
        Ok(Subscription::new(id, move || {
            active.store(false, Ordering::Release);
            if let Some(state) = state.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .subscribers
                    .retain(|s| s.id != id);
            }
            debug!(subscription = %id, "Unsubscribed from in-memory bus");
        }))
    }

    fn event_queue(&self) -> Vec<Event> {
        self.lock().queue.snapshot()
    }

    fn clear_queue(&self) {
        self.lock().queue.clear();
    }

    fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}
