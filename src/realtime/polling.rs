//! # Polling Fallback
//!
//! Periodic refresh for callers without a live channel. When `subscribe`
//! returns no handle the dashboard keeps itself current by refetching on
//! an interval instead; the rest of the UI never notices.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::observability::logger::RealtimeLogger;

/// Default refresh interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Faster interval for sensor readings
pub const SENSOR_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Handle to a running polling task. Polling stops when the handle is
/// stopped or dropped.
#[derive(Debug)]
pub struct PollingHandle {
    task: JoinHandle<()>,
}

impl PollingHandle {
    /// Stop polling
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the task is still running
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `fetch` once per interval tick until stopped.
///
/// The caller does its initial load itself; the first fetch here happens
/// one full interval after start.
pub fn start_polling<F, Fut>(
    table: &str,
    logger: RealtimeLogger,
    interval: Duration,
    mut fetch: F,
) -> PollingHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let table = table.to_string();
    let interval_ms = interval.as_millis().to_string();
    logger.trace(
        "POLLING_STARTED",
        &[("interval_ms", &interval_ms), ("table", &table)],
    );

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // interval fires immediately; consume that tick so the first
        // fetch waits a full period
        ticker.tick().await;
        loop {
            ticker.tick().await;
            logger.trace("POLLING_TICK", &[("table", &table)]);
            fetch().await;
        }
    });

    PollingHandle { task }
}
