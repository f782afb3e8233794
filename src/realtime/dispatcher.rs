//! # Event Dispatcher
//!
//! Wraps caller-supplied callbacks for delivery from the transport.
//!
//! A panic in one callback is caught and logged; it must never reach the
//! transport layer or affect other subscriptions. Deduplication, when a
//! subscription opts in, suppresses events whose signature was already
//! delivered within the window. Payloads pass through verbatim, in the
//! order the transport emits them.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::observability::logger::RealtimeLogger;

use super::event::ChangeEvent;
use super::filter::SubscriptionKey;
use super::transport::EventHandler;

/// Caller-supplied event callback
pub type EventCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Expired dedup entries are swept once the cache grows past this
const DEDUP_SWEEP_THRESHOLD: usize = 256;

/// Routes inbound events to caller callbacks with error isolation and
/// optional deduplication.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    /// (key, signature) → suppression deadline
    dedup_cache: Arc<Mutex<HashMap<(SubscriptionKey, String), Instant>>>,

    logger: RealtimeLogger,
}

impl EventDispatcher {
    /// Create a new dispatcher
    pub fn new(logger: RealtimeLogger) -> Self {
        Self {
            dedup_cache: Arc::new(Mutex::new(HashMap::new())),
            logger,
        }
    }

    /// Wrap a caller callback for delivery from the transport.
    ///
    /// `on_activity` fires for every event the transport hands us, before
    /// dedup filtering — dedup suppresses caller delivery, not evidence
    /// that the channel is alive.
    pub fn wrap(
        &self,
        key: SubscriptionKey,
        dedup_window: Option<Duration>,
        callback: EventCallback,
        on_activity: Arc<dyn Fn() + Send + Sync>,
    ) -> EventHandler {
        let dispatcher = self.clone();
        Arc::new(move |event: ChangeEvent| {
            on_activity();

            let key_str = key.to_string();
            dispatcher.logger.trace(
                "REALTIME_EVENT",
                &[("key", &key_str), ("type", event.change_type.as_str())],
            );

            if let Some(window) = dedup_window {
                if dispatcher.is_duplicate(&key, &event, window) {
                    dispatcher
                        .logger
                        .trace("REALTIME_EVENT_DEDUPED", &[("key", &key_str)]);
                    return;
                }
            }

            dispatcher.deliver(&key, &callback, event);
        })
    }

    /// Check the dedup cache, recording the event if it is fresh
    fn is_duplicate(&self, key: &SubscriptionKey, event: &ChangeEvent, window: Duration) -> bool {
        let signature = event.signature();
        let now = Instant::now();

        let Ok(mut cache) = self.dedup_cache.lock() else {
            return false;
        };

        // Lazy eviction: sweep expired entries when the cache gets large
        if cache.len() >= DEDUP_SWEEP_THRESHOLD {
            cache.retain(|_, deadline| *deadline > now);
        }

        let cache_key = (key.clone(), signature);
        match cache.get(&cache_key) {
            Some(deadline) if *deadline > now => true,
            _ => {
                cache.insert(cache_key, now + window);
                false
            }
        }
    }

    /// Invoke the callback, isolating panics from the transport
    fn deliver(&self, key: &SubscriptionKey, callback: &EventCallback, event: ChangeEvent) {
        let cb = Arc::clone(callback);
        let result = panic::catch_unwind(AssertUnwindSafe(move || cb(event)));

        if let Err(payload) = result {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "callback panicked".to_string()
            };
            let key_str = key.to_string();
            self.logger.error(
                "REALTIME_CALLBACK_PANIC",
                &[("key", &key_str), ("message", &message)],
            );
        }
    }

    /// Drop dedup entries for a removed subscription
    pub fn forget(&self, key: &SubscriptionKey) {
        if let Ok(mut cache) = self.dedup_cache.lock() {
            cache.retain(|(cached_key, _), _| cached_key != key);
        }
    }

    /// Drop every dedup entry; used during full teardown
    pub fn clear(&self) {
        if let Ok(mut cache) = self.dedup_cache.lock() {
            cache.clear();
        }
    }
}
