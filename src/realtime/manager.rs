//! # Subscription Manager
//!
//! Owns the key → channel registry and its lifecycle state. One manager is
//! constructed at the application's composition root and shared by
//! reference; it is the only component that opens or closes channels on
//! the transport.
//!
//! Registry bookkeeping is mutated synchronously; only the transport's
//! own subscribe/unsubscribe work is asynchronous. Each physical channel
//! carries a generation number, and status callbacks or scheduled retries
//! from a superseded generation are ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;
use tokio::time::sleep;

use crate::observability::logger::RealtimeLogger;

use super::config::RealtimeConfig;
use super::dispatcher::{EventCallback, EventDispatcher};
use super::errors::{RealtimeError, RealtimeResult};
use super::event::{ChangeEvent, ChangeType, EventDescriptor};
use super::filter::{SubscriptionFilter, SubscriptionKey};
use super::mutation::{self, Mutation};
use super::reconnect::ReconnectionController;
use super::transport::{
    ChangeFeedTransport, ChannelHandle, ChannelStatus, StatusHandler,
};

/// Lifecycle state of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Subscribe requested, outcome not yet reported
    Pending,
    /// Channel is live
    Subscribed,
    /// Channel failed
    Error,
    /// Subscribe attempt timed out
    TimedOut,
    /// Channel was closed by the transport
    Closed,
}

impl ChannelState {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Pending => "pending",
            ChannelState::Subscribed => "subscribed",
            ChannelState::Error => "error",
            ChannelState::TimedOut => "timed_out",
            ChannelState::Closed => "closed",
        }
    }

    /// A live entry keeps its channel when the same key subscribes again
    fn is_live(&self) -> bool {
        matches!(self, ChannelState::Pending | ChannelState::Subscribed)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options accepted by [`RealtimeManager::subscribe`]
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Change type the channel is scoped to (default: wildcard)
    pub event: ChangeType,

    /// Optional row filter; part of the subscription key
    pub filter: Option<SubscriptionFilter>,

    /// Suppress repeated identical events within the dedup window
    pub deduplicate: bool,

    /// Per-subscription dedup window; None uses the configured default
    pub dedup_window: Option<std::time::Duration>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            event: ChangeType::Wildcard,
            filter: None,
            deduplicate: false,
            dedup_window: None,
        }
    }
}

impl SubscribeOptions {
    /// Scope the channel to one change type
    pub fn with_event(mut self, event: ChangeType) -> Self {
        self.event = event;
        self
    }

    /// Filter rows; becomes part of the subscription key
    pub fn with_filter(mut self, filter: SubscriptionFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Enable deduplication, optionally overriding the window
    pub fn with_deduplication(mut self, window: Option<std::time::Duration>) -> Self {
        self.deduplicate = true;
        self.dedup_window = window;
        self
    }

    fn effective_dedup_window(&self, config: &RealtimeConfig) -> Option<std::time::Duration> {
        if self.deduplicate {
            Some(self.dedup_window.unwrap_or(config.dedup_window))
        } else {
            None
        }
    }
}

/// Handle returned to subscribers.
///
/// Re-subscribing to a live key returns an equal handle; no second
/// channel is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    key: SubscriptionKey,
    channel: ChannelHandle,
}

impl SubscriptionHandle {
    /// Registry key of this subscription
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Underlying channel handle
    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }
}

/// Snapshot of one registry entry
#[derive(Debug, Clone)]
pub struct SubscriptionStatus {
    /// Table name
    pub table: String,
    /// Lifecycle state
    pub state: ChannelState,
    /// Channel name on the wire
    pub channel_name: String,
    /// Current reconnect attempt count
    pub reconnect_attempts: u32,
}

/// Registry entry; owned exclusively by the manager
struct SubscriptionEntry {
    table: String,
    options: SubscribeOptions,
    callback: EventCallback,
    channel: ChannelHandle,
    state: ChannelState,
    generation: u64,
}

/// Multiplexes logical table subscriptions over the shared transport
/// connection, with reconnection and at-most-one-channel-per-key.
pub struct RealtimeManager {
    transport: Option<Arc<dyn ChangeFeedTransport>>,
    config: RealtimeConfig,
    subscriptions: RwLock<HashMap<SubscriptionKey, SubscriptionEntry>>,
    reconnect: ReconnectionController,
    dispatcher: EventDispatcher,
    logger: RealtimeLogger,
    generation: AtomicU64,
    weak_self: Weak<RealtimeManager>,
}

impl RealtimeManager {
    /// Construct a manager around an optional transport.
    ///
    /// `None` models a client that never initialized; every subscribe
    /// degrades to a logged no-op and callers poll instead.
    pub fn new(
        transport: Option<Arc<dyn ChangeFeedTransport>>,
        config: RealtimeConfig,
    ) -> Arc<Self> {
        let logger = RealtimeLogger::new(config.debug);
        Arc::new_cyclic(|weak| Self {
            transport,
            dispatcher: EventDispatcher::new(logger),
            reconnect: ReconnectionController::new(),
            subscriptions: RwLock::new(HashMap::new()),
            logger,
            config,
            generation: AtomicU64::new(0),
            weak_self: weak.clone(),
        })
    }

    /// Whether a transport is attached
    pub fn is_available(&self) -> bool {
        self.transport.is_some()
    }

    /// Active configuration
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Logger carrying this manager's debug flag
    pub fn logger(&self) -> RealtimeLogger {
        self.logger
    }

    /// Create or reuse a subscription for a table.
    ///
    /// Idempotent per (table, filter): a live entry keeps its channel and
    /// the existing handle is returned. Returns None when the transport
    /// is unavailable — callers treat that as "realtime disabled" and
    /// fall back to polling.
    pub fn subscribe<F>(
        &self,
        table: &str,
        callback: F,
        options: SubscribeOptions,
    ) -> Option<SubscriptionHandle>
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let Some(transport) = self.transport.clone() else {
            self.logger
                .warn("REALTIME_UNAVAILABLE", &[("table", table)]);
            return None;
        };

        let key = SubscriptionKey::new(table, options.filter.as_ref());

        if let Ok(subs) = self.subscriptions.read() {
            if let Some(entry) = subs.get(&key) {
                if entry.state.is_live() {
                    let key_str = key.to_string();
                    self.logger
                        .trace("REALTIME_SUBSCRIBE_REUSED", &[("key", &key_str)]);
                    return Some(SubscriptionHandle {
                        key,
                        channel: entry.channel.clone(),
                    });
                }
            }
        }

        let callback: EventCallback = Arc::new(callback);
        Some(self.open_subscription(&transport, key, table.to_string(), callback, options))
    }

    /// Open a fresh channel for the key, replacing any dead entry
    fn open_subscription(
        &self,
        transport: &Arc<dyn ChangeFeedTransport>,
        key: SubscriptionKey,
        table: String,
        callback: EventCallback,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let channel_name = format!("{}_changes_{}", table, generation);

        let key_str = key.to_string();
        self.logger.trace(
            "REALTIME_SUBSCRIBE",
            &[
                ("channel", &channel_name),
                ("event", options.event.as_str()),
                ("key", &key_str),
            ],
        );

        // A dead entry being replaced must release its channel first
        let stale = match self.subscriptions.write() {
            Ok(mut subs) => subs.remove(&key),
            Err(_) => None,
        };
        if let Some(stale) = stale {
            transport.close_channel(&stale.channel);
        }

        let on_activity: Arc<dyn Fn() + Send + Sync> = {
            let manager = self.weak_self.clone();
            let key = key.clone();
            Arc::new(move || {
                if let Some(manager) = manager.upgrade() {
                    manager.reconnect.reset(&key);
                }
            })
        };
        let on_event = self.dispatcher.wrap(
            key.clone(),
            options.effective_dedup_window(&self.config),
            Arc::clone(&callback),
            on_activity,
        );

        let on_status: StatusHandler = {
            let manager = self.weak_self.clone();
            let key = key.clone();
            Arc::new(move |status, error| {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_status(&key, generation, status, error);
                }
            })
        };

        let descriptor = EventDescriptor::new(
            options.event,
            &self.config.schema,
            &table,
            options.filter.clone(),
        );
        let channel = transport.open_channel(&channel_name, descriptor, on_event, on_status);

        let entry = SubscriptionEntry {
            table,
            options,
            callback,
            channel: channel.clone(),
            state: ChannelState::Pending,
            generation,
        };
        if let Ok(mut subs) = self.subscriptions.write() {
            subs.insert(key.clone(), entry);
        }

        SubscriptionHandle { key, channel }
    }

    /// Apply a transport status transition for one channel generation
    fn handle_status(
        &self,
        key: &SubscriptionKey,
        generation: u64,
        status: ChannelStatus,
        error: Option<String>,
    ) {
        {
            let Ok(mut subs) = self.subscriptions.write() else {
                return;
            };
            let Some(entry) = subs.get_mut(key) else {
                return;
            };
            // A replaced or removed channel may still report; ignore it
            if entry.generation != generation {
                return;
            }
            entry.state = match status {
                ChannelStatus::Subscribed => ChannelState::Subscribed,
                ChannelStatus::ChannelError => ChannelState::Error,
                ChannelStatus::TimedOut => ChannelState::TimedOut,
                ChannelStatus::Closed => ChannelState::Closed,
            };
        }

        let key_str = key.to_string();
        match status {
            ChannelStatus::Subscribed => {
                self.logger
                    .trace("REALTIME_SUBSCRIBED", &[("key", &key_str)]);
                self.reconnect.reset(key);
            }
            ChannelStatus::ChannelError | ChannelStatus::TimedOut => {
                self.logger.warn(
                    "REALTIME_CHANNEL_DOWN",
                    &[
                        ("error", error.as_deref().unwrap_or("")),
                        ("key", &key_str),
                        ("status", status.as_str()),
                    ],
                );
                self.schedule_reconnect(key.clone(), generation);
            }
            ChannelStatus::Closed => {
                self.logger.trace("REALTIME_CLOSED", &[("key", &key_str)]);
            }
        }
    }

    /// Schedule a backoff retry, or abandon the key at the attempt cap
    fn schedule_reconnect(&self, key: SubscriptionKey, generation: u64) {
        let Some(delay) = self.reconnect.next_delay(
            &key,
            self.config.base_reconnect_delay,
            self.config.max_reconnect_attempts,
        ) else {
            let err = RealtimeError::MaxRetriesExceeded { key: key.clone() };
            let key_str = key.to_string();
            let err_str = err.to_string();
            self.logger.error(
                "REALTIME_RETRIES_EXHAUSTED",
                &[("error", &err_str), ("key", &key_str)],
            );
            return;
        };

        let key_str = key.to_string();
        let attempt = self.reconnect.attempts(&key).to_string();
        let delay_ms = delay.as_millis().to_string();
        self.logger.trace(
            "REALTIME_RECONNECT_SCHEDULED",
            &[
                ("attempt", &attempt),
                ("delay_ms", &delay_ms),
                ("key", &key_str),
            ],
        );

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.logger
                .warn("REALTIME_NO_RUNTIME", &[("key", &key_str)]);
            return;
        };
        let manager = self.weak_self.clone();
        runtime.spawn(async move {
            sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                manager.retry(key, generation);
            }
        });
    }

    /// Re-open the channel for a failed entry.
    ///
    /// Aborts silently when the entry was unsubscribed or replaced while
    /// the retry was pending.
    fn retry(&self, key: SubscriptionKey, generation: u64) {
        let Some(transport) = self.transport.clone() else {
            return;
        };

        let (table, callback, options) = {
            let Ok(subs) = self.subscriptions.read() else {
                return;
            };
            let Some(entry) = subs.get(&key) else {
                return;
            };
            if entry.generation != generation {
                return;
            }
            (
                entry.table.clone(),
                Arc::clone(&entry.callback),
                entry.options.clone(),
            )
        };

        // Release the dead channel. The attempt counter survives so the
        // backoff keeps escalating if this attempt fails too.
        self.remove_entry(&key, false);
        self.open_subscription(&transport, key, table, callback, options);
    }

    /// Unsubscribe from a table. No-op when the key is unknown.
    pub fn unsubscribe(&self, table: &str, options: &SubscribeOptions) {
        let key = SubscriptionKey::new(table, options.filter.as_ref());
        self.unsubscribe_key(&key);
    }

    /// Unsubscribe via the handle returned by [`subscribe`](Self::subscribe)
    pub fn unsubscribe_handle(&self, handle: &SubscriptionHandle) {
        self.unsubscribe_key(handle.key());
    }

    /// Unsubscribe by registry key. No-op when the key is unknown.
    pub fn unsubscribe_key(&self, key: &SubscriptionKey) {
        if self.remove_entry(key, true) {
            let key_str = key.to_string();
            self.logger
                .trace("REALTIME_UNSUBSCRIBE", &[("key", &key_str)]);
        }
    }

    /// Remove an entry and release its channel.
    ///
    /// `clear_attempts` distinguishes caller unsubscribes (counter goes)
    /// from internal retry turnover (counter survives).
    fn remove_entry(&self, key: &SubscriptionKey, clear_attempts: bool) -> bool {
        let removed = match self.subscriptions.write() {
            Ok(mut subs) => subs.remove(key),
            Err(_) => None,
        };
        let Some(entry) = removed else {
            return false;
        };

        if let Some(transport) = &self.transport {
            transport.close_channel(&entry.channel);
        }
        self.dispatcher.forget(key);
        if clear_attempts {
            self.reconnect.forget(key);
        }
        true
    }

    /// Release every subscription; used during full teardown
    pub fn unsubscribe_all(&self) {
        self.logger.trace("REALTIME_UNSUBSCRIBE_ALL", &[]);

        let drained: Vec<SubscriptionEntry> = match self.subscriptions.write() {
            Ok(mut subs) => subs.drain().map(|(_, entry)| entry).collect(),
            Err(_) => return,
        };

        if let Some(transport) = &self.transport {
            for entry in &drained {
                transport.close_channel(&entry.channel);
            }
        }
        self.reconnect.clear();
        self.dispatcher.clear();
    }

    /// Snapshot of every registry entry
    pub fn subscription_status(&self) -> HashMap<SubscriptionKey, SubscriptionStatus> {
        let Ok(subs) = self.subscriptions.read() else {
            return HashMap::new();
        };
        subs.iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    SubscriptionStatus {
                        table: entry.table.clone(),
                        state: entry.state,
                        channel_name: entry.channel.name.clone(),
                        reconnect_attempts: self.reconnect.attempts(key),
                    },
                )
            })
            .collect()
    }

    /// Apply a local update, run the remote mutation, revert on failure.
    ///
    /// Exactly one of commit or revert happens. Returns the
    /// server-confirmed record for insert/update, None for delete. For
    /// dynamic operation names, parse with [`Mutation::from_parts`] first;
    /// unknown names fail there before any local state changes.
    pub async fn optimistic_update<A, R>(
        &self,
        table: &str,
        mutation: Mutation,
        apply_local: A,
        revert_local: R,
    ) -> RealtimeResult<Option<Value>>
    where
        A: FnOnce(&Mutation) + Send,
        R: FnOnce(&Mutation) + Send,
    {
        let Some(transport) = self.transport.clone() else {
            return Err(RealtimeError::TransportUnavailable);
        };
        mutation::run(
            transport.as_ref(),
            &self.logger,
            table,
            mutation,
            apply_local,
            revert_local,
        )
        .await
    }
}
