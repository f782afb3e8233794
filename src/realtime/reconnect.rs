//! # Reconnection Controller
//!
//! Per-key attempt counters and the exponential-backoff schedule for
//! channels that fail. The manager owns the timers; this type owns the
//! arithmetic and the bookkeeping.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use super::filter::SubscriptionKey;

/// Attempt counters keyed by subscription
#[derive(Debug, Default)]
pub struct ReconnectionController {
    attempts: RwLock<HashMap<SubscriptionKey, u32>>,
}

impl ReconnectionController {
    /// Create a new controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Current attempt count for a key
    pub fn attempts(&self, key: &SubscriptionKey) -> u32 {
        self.attempts
            .read()
            .map(|map| map.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Delay for the next retry, or None once the cap is reached.
    ///
    /// The Nth retry waits `base * 2^(N-1)`. Recording the attempt and
    /// computing its delay happen together so two failures for the same
    /// key can never claim the same slot.
    pub fn next_delay(
        &self,
        key: &SubscriptionKey,
        base: Duration,
        max_attempts: u32,
    ) -> Option<Duration> {
        let mut attempts = self.attempts.write().ok()?;
        let count = attempts.entry(key.clone()).or_insert(0);
        if *count >= max_attempts {
            return None;
        }
        let delay = base.saturating_mul(2u32.saturating_pow(*count));
        *count += 1;
        Some(delay)
    }

    /// Reset a key's counter; called on successful subscribe or event delivery
    pub fn reset(&self, key: &SubscriptionKey) {
        if let Ok(mut attempts) = self.attempts.write() {
            attempts.insert(key.clone(), 0);
        }
    }

    /// Drop a key's counter entirely; called on explicit unsubscribe
    pub fn forget(&self, key: &SubscriptionKey) {
        if let Ok(mut attempts) = self.attempts.write() {
            attempts.remove(key);
        }
    }

    /// Drop every counter; used during full teardown
    pub fn clear(&self) {
        if let Ok(mut attempts) = self.attempts.write() {
            attempts.clear();
        }
    }
}
