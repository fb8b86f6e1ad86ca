//! Reply router - the table of pending bus-mediated requests
//!
//! One bus subscription watches for `task_clarification_answer` (keyed by
//! task id) and `agent_answer` (keyed by agent id). A waiter registers its
//! key before announcing its question, then awaits a oneshot resolved by
//! the matching event. Every entry leaves the table exactly once: when the
//! reply is routed, or when the waiter gives up (timeout or drop).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event_bus::{callback, Event, EventBus, EventKind, Subscription};

/// Correlation key for a pending reply
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReplyKey {
    /// Clarification for a task
    Task(Uuid),
    /// Answer to an agent's question
    Agent(String),
}

impl fmt::Display for ReplyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task:{}", id),
            Self::Agent(id) => write!(f, "agent:{}", id),
        }
    }
}

type Table = DashMap<ReplyKey, oneshot::Sender<String>>;

/// Routes answer events to registered waiters
pub struct ReplyRouter {
    pending: Arc<Table>,
    subscription: Subscription,
}

impl ReplyRouter {
    /// Subscribe to `bus` and start routing.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription cannot be created
    pub async fn attach(bus: &dyn EventBus) -> Result<Arc<Self>> {
        let pending: Arc<Table> = Arc::new(DashMap::new());
        let table = pending.clone();
        let subscription = bus
            .subscribe(callback(move |event| {
                route(&table, event);
                Ok(())
            }))
            .await?;

        Ok(Arc::new(Self {
            pending,
            subscription,
        }))
    }

    /// Register a waiter for `key`.
    ///
    /// Register before publishing the question, so an immediate answer
    /// cannot be missed.
    ///
    /// # Errors
    ///
    /// `ClarificationInFlight` if someone is already waiting on `key`
    pub fn register(&self, key: ReplyKey) -> Result<PendingReply> {
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_closed() {
                    return Err(Error::ClarificationInFlight(key.to_string()));
                }
                // previous waiter is gone but its entry is still here
                entry.insert(tx);
            }
            Entry::Vacant(entry) => {
                entry.insert(tx);
            }
        }
        debug!(key = %key, "Reply waiter registered");

        Ok(PendingReply {
            key,
            rx: Some(rx),
            table: self.pending.clone(),
        })
    }

    /// Number of registered waiters
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a waiter is registered for `key`
    #[must_use]
    pub fn is_waiting(&self, key: &ReplyKey) -> bool {
        self.pending.contains_key(key)
    }
}

impl Drop for ReplyRouter {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

fn route(table: &Table, event: &Event) {
    let (key, answer) = match &event.kind {
        EventKind::TaskClarificationAnswer { task_id, answer } => (ReplyKey::Task(*task_id), answer),
        EventKind::AgentAnswer { agent_id, answer } => (ReplyKey::Agent(agent_id.clone()), answer),
        _ => return,
    };

    match table.remove(&key) {
        Some((_, tx)) => {
            if tx.send(answer.clone()).is_ok() {
                debug!(key = %key, "Reply delivered");
            } else {
                debug!(key = %key, "Reply arrived after waiter gave up");
            }
        }
        None => debug!(key = %key, "Reply with no waiter ignored"),
    }
}

/// A registered waiter. Dropping it deregisters the key.
#[must_use = "a pending reply does nothing unless waited on"]
pub struct PendingReply {
    key: ReplyKey,
    rx: Option<oneshot::Receiver<String>>,
    table: Arc<Table>,
}

impl PendingReply {
    /// Correlation key
    #[must_use]
    pub fn key(&self) -> &ReplyKey {
        &self.key
    }

    /// Wait up to `limit` for the reply.
    ///
    /// # Errors
    ///
    /// `ClarificationTimeout` if nothing arrives in time
    pub async fn wait(mut self, limit: Duration) -> Result<String> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| Error::Internal("reply already consumed".into()))?;

        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => Err(Error::Bus(format!("reply channel for {} closed", self.key))),
            Err(_) => Err(Error::ClarificationTimeout {
                key: self.key.to_string(),
                limit,
            }),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        // close our receiver first so only our own stale entry matches
        drop(self.rx.take());
        self.table.remove_if(&self.key, |_, tx| tx.is_closed());
    }
}
