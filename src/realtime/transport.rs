//! # Change-Feed Transport
//!
//! The seam to the backend change-feed client. The manager is the only
//! component that opens or closes logical channels on the shared
//! connection; callers never touch the transport directly.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::errors::RealtimeResult;
use super::event::{ChangeEvent, EventDescriptor};

/// Channel status reported by the transport's status callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Channel is live and delivering events
    Subscribed,
    /// Transient channel failure
    ChannelError,
    /// Subscribe attempt timed out
    TimedOut,
    /// Channel was closed
    Closed,
}

impl ChannelStatus {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Subscribed => "SUBSCRIBED",
            ChannelStatus::ChannelError => "CHANNEL_ERROR",
            ChannelStatus::TimedOut => "TIMED_OUT",
            ChannelStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to an open transport channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    /// Unique channel ID
    pub id: Uuid,

    /// Channel name on the wire
    pub name: String,
}

impl ChannelHandle {
    /// Create a handle for a named channel
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Handler invoked for every event a channel delivers
pub type EventHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Handler invoked on channel status transitions
pub type StatusHandler = Arc<dyn Fn(ChannelStatus, Option<String>) + Send + Sync>;

/// Backend change-feed client as seen by the subscription manager.
///
/// Channel failures surface through the status handler, never as return
/// values: `open_channel` registers the handlers and requests the
/// subscription, and the transport reports the outcome asynchronously.
/// Implementations must not invoke either handler from inside
/// `open_channel` itself.
#[async_trait]
pub trait ChangeFeedTransport: Send + Sync {
    /// Open a logical channel scoped to the descriptor
    fn open_channel(
        &self,
        name: &str,
        descriptor: EventDescriptor,
        on_event: EventHandler,
        on_status: StatusHandler,
    ) -> ChannelHandle;

    /// Release a channel; late callbacks for it may still arrive and are
    /// the manager's to ignore
    fn close_channel(&self, handle: &ChannelHandle);

    /// Insert a row, resolving to the server-confirmed record
    async fn insert(&self, table: &str, row: Value) -> RealtimeResult<Value>;

    /// Update the row with the given id, resolving to the confirmed record
    async fn update(&self, table: &str, id: &Value, changes: Value) -> RealtimeResult<Value>;

    /// Delete the row with the given id
    async fn delete(&self, table: &str, id: &Value) -> RealtimeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ChannelStatus::Subscribed.as_str(), "SUBSCRIBED");
        assert_eq!(ChannelStatus::ChannelError.as_str(), "CHANNEL_ERROR");
        assert_eq!(ChannelStatus::TimedOut.as_str(), "TIMED_OUT");
        assert_eq!(ChannelStatus::Closed.as_str(), "CLOSED");
    }

    #[test]
    fn test_channel_handles_are_distinct() {
        let a = ChannelHandle::new("zones_changes_1");
        let b = ChannelHandle::new("zones_changes_1");
        // Same name, different identity
        assert_ne!(a, b);
        assert_eq!(a.name, b.name);
    }
}
