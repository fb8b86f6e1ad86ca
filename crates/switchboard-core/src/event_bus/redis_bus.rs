//! Redis Streams event bus
//!
//! Topology:
//! - one stream (`stream_key`) plays the fanout exchange; every event is an
//!   `XADD` entry with a single `payload` field holding the event JSON
//! - every subscription owns a consumer group `sub:<uuid>` created at `$`,
//!   so it only sees entries added after `subscribe` returned
//! - entries are acked after the callback returns; failures are acked too
//!   and logged (rejected without requeue)
//! - unsubscribing destroys the group
//!
//! While the broker is unreachable, publishes land in the retention buffer
//! and an outbox. A successful reconnect first creates the groups of
//! subscriptions made during the outage and destroys the groups of
//! subscriptions released during it, then flushes the outbox in order.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bus::{EventBus, EventCallback, RetentionBuffer, Subscription, DEFAULT_RETENTION};
use super::factory::BusBackend;
use super::types::{Event, EventKind};
use crate::error::{Error, Result};
use crate::utils::{retry, Backoff};

/// Field holding the serialized event in each stream entry
const PAYLOAD_FIELD: &str = "payload";

/// `XREADGROUP` reply: `[(stream, [(entry id, {field: value})])]`
type StreamReply = Vec<(String, Vec<(String, HashMap<String, String>)>)>;

/// Settings for [`RedisEventBus`]
#[derive(Debug, Clone)]
pub struct RedisBusConfig {
    /// Broker URL
    pub url: String,
    /// Stream key
    pub stream_key: String,
    /// Retention buffer capacity, also the outbox bound
    pub retention: usize,
    /// Approximate stream length cap
    pub stream_max_len: usize,
    /// Consumer poll interval when idle
    pub poll_interval: Duration,
    /// Entries fetched per read
    pub batch_size: usize,
    /// Timeout applied to every broker command
    pub command_timeout: Duration,
    /// Connection attempts made by `connect` before starting degraded
    pub connect_attempts: u32,
    /// First reconnect delay
    pub reconnect_initial_delay: Duration,
    /// Reconnect delay cap
    pub reconnect_max_delay: Duration,
}

impl Default for RedisBusConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            stream_key: "switchboard:events".to_string(),
            retention: DEFAULT_RETENTION,
            stream_max_len: 10_000,
            poll_interval: Duration::from_millis(100),
            batch_size: 64,
            command_timeout: Duration::from_secs(2),
            connect_attempts: 2,
            reconnect_initial_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}

impl RedisBusConfig {
    fn connect_policy(&self) -> Backoff {
        Backoff::bounded(
            self.connect_attempts,
            self.reconnect_initial_delay,
            self.reconnect_max_delay,
        )
    }

    fn reconnect_policy(&self) -> Backoff {
        Backoff::unbounded(self.reconnect_initial_delay, self.reconnect_max_delay)
    }
}

struct Local {
    queue: RetentionBuffer,
    outbox: VecDeque<Event>,
}

/// A live subscription as seen by the reconnect loop
struct Registration {
    group: String,
    group_ready: Arc<AtomicBool>,
}

struct Shared {
    client: redis::Client,
    config: RedisBusConfig,
    conn: RwLock<Option<MultiplexedConnection>>,
    local: Mutex<Local>,
    /// Held while writing the outbox, and while a reconnect provisions
    /// groups, so nothing reaches the stream before deferred groups exist
    flush_lock: tokio::sync::Mutex<()>,
    subscribers: DashMap<Uuid, Registration>,
    /// Groups of subscriptions released while disconnected
    orphaned_groups: Mutex<Vec<String>>,
    reconnecting: AtomicBool,
    shutdown: CancellationToken,
}

/// Durable event bus on Redis Streams
pub struct RedisEventBus {
    shared: Arc<Shared>,
}

impl RedisEventBus {
    /// Connect to the broker.
    ///
    /// An unreachable broker is logged and the bus starts degraded with a
    /// background reconnect loop.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot be parsed
    pub async fn connect(config: RedisBusConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::Configuration(format!("invalid redis url: {}", e)))?;

        let shared = Arc::new(Shared {
            client,
            local: Mutex::new(Local {
                queue: RetentionBuffer::new(config.retention),
                outbox: VecDeque::new(),
            }),
            config,
            conn: RwLock::new(None),
            flush_lock: tokio::sync::Mutex::new(()),
            subscribers: DashMap::new(),
            orphaned_groups: Mutex::new(Vec::new()),
            reconnecting: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        let policy = shared.config.connect_policy();
        match retry(&policy, || shared.open_connection(), Error::is_transient).await
        {
            Ok(conn) => {
                shared.set_connection(Some(conn));
                info!(stream = %shared.config.stream_key, "Connected to Redis event bus");
            }
            Err(e) => {
                warn!(
                    error = %e.last_error,
                    attempts = e.attempts,
                    "Redis unavailable, event bus starting degraded"
                );
                shared.start_reconnect();
            }
        }

        Ok(Self { shared })
    }

    /// Whether a broker connection is currently held
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connection().is_some()
    }

    /// Events published locally but not yet written to the stream
    #[must_use]
    pub fn pending_broadcast(&self) -> usize {
        self.shared.local().outbox.len()
    }

    /// Subscriptions whose consumer group is not created yet
    #[must_use]
    pub fn deferred_subscriptions(&self) -> usize {
        self.shared
            .subscribers
            .iter()
            .filter(|entry| !entry.group_ready.load(Ordering::Acquire))
            .count()
    }

    /// Consumer groups waiting to be destroyed once the broker is reachable
    #[must_use]
    pub fn pending_group_cleanup(&self) -> usize {
        self.shared.orphans().len()
    }

    /// Drop the connection as if the broker had gone away. The reconnect
    /// loop takes over from there.
    #[cfg(test)]
    pub(crate) fn force_disconnect(&self) {
        self.shared
            .mark_disconnected(&Error::Redis("connection dropped by test".into()));
    }

    /// Stop the reconnect loop and every consumer
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

impl Drop for RedisEventBus {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl Shared {
    fn local(&self) -> MutexGuard<'_, Local> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn orphans(&self) -> MutexGuard<'_, Vec<String>> {
        self.orphaned_groups.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn connection(&self) -> Option<MultiplexedConnection> {
        self.conn.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_connection(&self, conn: Option<MultiplexedConnection>) {
        *self.conn.write().unwrap_or_else(|e| e.into_inner()) = conn;
    }

    async fn open_connection(&self) -> Result<MultiplexedConnection> {
        timeout(
            self.config.command_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| Error::Redis("connection attempt timed out".into()))?
        .map_err(Error::from)
    }

    /// Drop the current connection and make sure a reconnect loop runs
    fn mark_disconnected(self: &Arc<Self>, error: &Error) {
        let had_connection = self
            .conn
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some();
        if had_connection {
            warn!(error = %error, "Lost connection to Redis, reconnecting");
        }
        self.start_reconnect();
    }

    fn start_reconnect(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() || self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.reconnect_loop().await });
    }

    async fn reconnect_loop(self: Arc<Self>) {
        let policy = self.config.reconnect_policy();
        let mut attempt: u32 = 1;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.reconnecting.store(false, Ordering::Release);
                    return;
                }
                _ = sleep(policy.delay(attempt)) => {}
            }

            let restored = match self.open_connection().await {
                Ok(conn) => self.restore(conn).await,
                Err(e) => Err(e),
            };

            match restored {
                Ok(()) => {
                    self.reconnecting.store(false, Ordering::Release);
                    info!(
                        attempt = attempt,
                        pending = self.local().outbox.len(),
                        "Reconnected to Redis event bus"
                    );
                    self.flush_outbox().await;
                    return;
                }
                Err(e) => {
                    debug!(attempt = attempt, error = %e, "Reconnect attempt failed");
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Install `conn` and bring the broker in line with the local registry.
    ///
    /// Runs under the flush lock: a concurrent publish sees the connection
    /// but cannot write the outbox until every deferred group exists at `$`.
    async fn restore(&self, conn: MultiplexedConnection) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        self.set_connection(Some(conn.clone()));

        let outcome = match self.provision_groups(&conn).await {
            Ok(()) => self.destroy_orphaned_groups(&conn).await,
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            self.set_connection(None);
        }
        outcome
    }

    async fn provision_groups(&self, conn: &MultiplexedConnection) -> Result<()> {
        let deferred: Vec<(Uuid, String, Arc<AtomicBool>)> = self
            .subscribers
            .iter()
            .filter(|entry| !entry.group_ready.load(Ordering::Acquire))
            .map(|entry| (*entry.key(), entry.group.clone(), entry.group_ready.clone()))
            .collect();

        for (id, group, ready) in deferred {
            self.create_group(conn.clone(), &group).await?;
            ready.store(true, Ordering::Release);
            debug!(subscription = %id, "Deferred consumer group created");
        }
        Ok(())
    }

    async fn destroy_orphaned_groups(&self, conn: &MultiplexedConnection) -> Result<()> {
        let orphans = std::mem::take(&mut *self.orphans());

        for (index, group) in orphans.iter().enumerate() {
            if let Err(e) = self.destroy_group(conn.clone(), group).await {
                self.orphans().extend(orphans[index..].iter().cloned());
                return Err(e);
            }
        }
        Ok(())
    }

    /// `XGROUP DESTROY`. Only connectivity failures are returned; a group
    /// the broker no longer knows about counts as destroyed.
    async fn destroy_group(&self, mut conn: MultiplexedConnection, group: &str) -> Result<()> {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("DESTROY").arg(&self.config.stream_key).arg(group);

        match timeout(self.config.command_timeout, cmd.query_async::<i64>(&mut conn)).await {
            Ok(Ok(_)) => {
                debug!(group = %group, "Consumer group destroyed");
                Ok(())
            }
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() => {
                Err(e.into())
            }
            Ok(Err(e)) => {
                debug!(group = %group, error = %e, "XGROUP DESTROY rejected, group dropped");
                Ok(())
            }
            Err(_) => Err(Error::Redis("XGROUP DESTROY timed out".into())),
        }
    }

    /// Remember a group to destroy on the next reconnect
    fn orphan_group(&self, group: String) {
        debug!(group = %group, "Consumer group cleanup deferred until reconnection");
        self.orphans().push(group);
    }

    /// Write queued events to the stream in order, stopping at the first failure
    async fn flush_outbox(self: &Arc<Self>) {
        let _guard = self.flush_lock.lock().await;

        loop {
            let Some(conn) = self.connection() else {
                return;
            };
            let Some(event) = self.local().outbox.front().cloned() else {
                return;
            };

            match self.xadd(conn, &event).await {
                Ok(()) => {}
                Err(Error::Serialization(e)) => {
                    warn!(event_id = %event.id, error = %e, "Dropping unserializable event");
                }
                Err(e) => {
                    warn!(
                        event_type = event.event_type(),
                        error = %e,
                        "Broadcast failed, event kept locally"
                    );
                    self.mark_disconnected(&e);
                    return;
                }
            }

            let mut local = self.local();
            if local.outbox.front().map(|e| e.id) == Some(event.id) {
                local.outbox.pop_front();
            }
        }
    }

    async fn xadd(&self, mut conn: MultiplexedConnection, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.config.stream_key)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.stream_max_len)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload);

        timeout(self.config.command_timeout, cmd.query_async::<String>(&mut conn))
            .await
            .map_err(|_| Error::Redis("XADD timed out".into()))??;
        Ok(())
    }

    async fn create_group(&self, mut conn: MultiplexedConnection, group: &str) -> Result<()> {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE")
            .arg(&self.config.stream_key)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM");

        let result = timeout(self.config.command_timeout, cmd.query_async::<()>(&mut conn))
            .await
            .map_err(|_| Error::Redis("XGROUP CREATE timed out".into()))?;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    fn backend(&self) -> BusBackend {
        BusBackend::Redis
    }

    async fn publish(&self, kind: EventKind) -> Event {
        let event = Event::new(kind);

        {
            let mut local = self.shared.local();
            local.queue.push(event.clone());
            if local.outbox.len() >= local.queue.capacity() {
                local.outbox.pop_front();
                warn!("Outbox full, oldest unbroadcast event dropped");
            }
            local.outbox.push_back(event.clone());
        }

        if self.shared.connection().is_some() {
            self.shared.flush_outbox().await;
        } else {
            warn!(
                event_type = event.event_type(),
                pending = self.pending_broadcast(),
                "Redis disconnected, event cached locally"
            );
        }

        event
    }

    async fn subscribe(&self, callback: EventCallback) -> Result<Subscription> {
        let id = Uuid::new_v4();
        let group = format!("sub:{}", id);
        let token = self.shared.shutdown.child_token();
        let group_ready = Arc::new(AtomicBool::new(false));

        // registered before the connection check, so a reconnect that races
        // with this call either finds the entry or is seen below
        self.shared.subscribers.insert(
            id,
            Registration {
                group: group.clone(),
                group_ready: group_ready.clone(),
            },
        );

        if let Some(conn) = self.shared.connection() {
            match self.shared.create_group(conn, &group).await {
                Ok(()) => group_ready.store(true, Ordering::Release),
                Err(e) => self.shared.mark_disconnected(&e),
            }
        }
        if !group_ready.load(Ordering::Acquire) {
            warn!(subscription = %id, "Redis disconnected, subscription deferred until reconnection");
        }

        let consumer = Consumer {
            shared: Arc::clone(&self.shared),
            id,
            name: format!("consumer-{}", id),
            group,
            callback,
            token: token.clone(),
            group_ready,
        };
        tokio::spawn(consumer.run());
        debug!(subscription = %id, "Subscribed to Redis bus");

        let shared = Arc::downgrade(&self.shared);
        Ok(Subscription::new(id, move || {
            token.cancel();
            if let Some(shared) = shared.upgrade() {
                shared.subscribers.remove(&id);
            }
        }))
    }

    fn event_queue(&self) -> Vec<Event> {
        self.shared.local().queue.snapshot()
    }

    fn clear_queue(&self) {
        self.shared.local().queue.clear();
    }

    fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }
}

/// Background reader for one subscription's consumer group
struct Consumer {
    shared: Arc<Shared>,
    id: Uuid,
    name: String,
    group: String,
    callback: EventCallback,
    token: CancellationToken,
    group_ready: Arc<AtomicBool>,
}

impl Consumer {
    async fn run(self) {
        while !self.token.is_cancelled() {
            let Some(conn) = self.shared.connection() else {
                if self.idle().await {
                    break;
                }
                continue;
            };

            if !self.group_ready.load(Ordering::Acquire) {
                match self.shared.create_group(conn.clone(), &self.group).await {
                    Ok(()) => {
                        debug!(subscription = %self.id, "Consumer group ready");
                        self.group_ready.store(true, Ordering::Release);
                    }
                    Err(e) => {
                        self.shared.mark_disconnected(&e);
                        if self.idle().await {
                            break;
                        }
                        continue;
                    }
                }
            }

            match self.read(conn.clone()).await {
                Ok(entries) if entries.is_empty() => {
                    if self.idle().await {
                        break;
                    }
                }
                Ok(entries) => {
                    for (entry_id, fields) in entries {
                        if self.token.is_cancelled() {
                            break;
                        }
                        self.deliver(&entry_id, &fields);
                        self.ack(conn.clone(), &entry_id).await;
                    }
                }
                Err(e) if e.to_string().contains("NOGROUP") => {
                    warn!(subscription = %self.id, "Consumer group lost, recreating");
                    self.group_ready.store(false, Ordering::Release);
                }
                Err(e) => {
                    self.shared.mark_disconnected(&e);
                    if self.idle().await {
                        break;
                    }
                }
            }
        }

        self.teardown().await;
    }

    /// Sleep one poll interval; true if the subscription was cancelled meanwhile
    async fn idle(&self) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = sleep(self.shared.config.poll_interval) => false,
        }
    }

    async fn read(
        &self,
        mut conn: MultiplexedConnection,
    ) -> Result<Vec<(String, HashMap<String, String>)>> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.name)
            .arg("COUNT")
            .arg(self.shared.config.batch_size)
            .arg("STREAMS")
            .arg(&self.shared.config.stream_key)
            .arg(">");

        let reply = timeout(
            self.shared.config.command_timeout,
            cmd.query_async::<Option<StreamReply>>(&mut conn),
        )
        .await
        .map_err(|_| Error::Redis("XREADGROUP timed out".into()))??;

        Ok(reply
            .unwrap_or_default()
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .collect())
    }

    fn deliver(&self, entry_id: &str, fields: &HashMap<String, String>) {
        let Some(payload) = fields.get(PAYLOAD_FIELD) else {
            warn!(subscription = %self.id, entry = %entry_id, "Entry without payload, rejected");
            return;
        };

        match serde_json::from_str::<Event>(payload) {
            Ok(event) => {
                if let Err(e) = (self.callback)(&event) {
                    warn!(
                        subscription = %self.id,
                        entry = %entry_id,
                        event_type = event.event_type(),
                        error = %e,
                        "Subscriber callback failed, message rejected"
                    );
                }
            }
            Err(e) => {
                warn!(
                    subscription = %self.id,
                    entry = %entry_id,
                    error = %e,
                    "Undecodable event payload, message rejected"
                );
            }
        }
    }

    async fn ack(&self, mut conn: MultiplexedConnection, entry_id: &str) {
        let mut cmd = redis::cmd("XACK");
        cmd.arg(&self.shared.config.stream_key)
            .arg(&self.group)
            .arg(entry_id);

        match timeout(self.shared.config.command_timeout, cmd.query_async::<i64>(&mut conn)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(entry = %entry_id, error = %e, "XACK failed"),
            Err(_) => debug!(entry = %entry_id, "XACK timed out"),
        }
    }

    async fn teardown(&self) {
        self.shared.subscribers.remove(&self.id);

        // after shutdown nothing will reconnect to clean up
        let retry_later = !self.shared.shutdown.is_cancelled();

        let Some(conn) = self.shared.connection() else {
            if retry_later {
                self.shared.orphan_group(self.group.clone());
            }
            return;
        };
        if let Err(e) = self.shared.destroy_group(conn, &self.group).await {
            debug!(subscription = %self.id, error = %e, "XGROUP DESTROY failed");
            if retry_later {
                self.shared.orphan_group(self.group.clone());
                self.shared.mark_disconnected(&e);
            }
        }
    }
}
