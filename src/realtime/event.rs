//! # Change Events
//!
//! Event types for row changes and the descriptor a channel is scoped to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::SubscriptionFilter;

/// Type of row change
///
/// `Wildcard` is only valid as a subscription scope; concrete events
/// always carry a concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// New record inserted
    Insert,
    /// Existing record updated
    Update,
    /// Record deleted
    Delete,
    /// Any of the above (subscription scope only)
    #[serde(rename = "*")]
    Wildcard,
}

impl ChangeType {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "INSERT",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
            ChangeType::Wildcard => "*",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row-change notification delivered to subscription callbacks.
///
/// Immutable; the manager passes payloads through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the row
    pub change_type: ChangeType,

    /// New record data (for INSERT/UPDATE)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_record: Option<Value>,

    /// Old record data (for UPDATE/DELETE)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_record: Option<Value>,

    /// When the event was received
    pub received_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an INSERT event
    pub fn insert(row: Value) -> Self {
        Self {
            change_type: ChangeType::Insert,
            new_record: Some(row),
            old_record: None,
            received_at: Utc::now(),
        }
    }

    /// Create an UPDATE event
    pub fn update(old_row: Value, new_row: Value) -> Self {
        Self {
            change_type: ChangeType::Update,
            new_record: Some(new_row),
            old_record: Some(old_row),
            received_at: Utc::now(),
        }
    }

    /// Create a DELETE event
    pub fn delete(old_row: Value) -> Self {
        Self {
            change_type: ChangeType::Delete,
            new_record: None,
            old_record: Some(old_row),
            received_at: Utc::now(),
        }
    }

    /// The record this event is about: new data if present, else old
    pub fn record(&self) -> Option<&Value> {
        self.new_record.as_ref().or(self.old_record.as_ref())
    }

    /// Deduplication signature: change type plus the serialized payload.
    ///
    /// The receive timestamp is deliberately excluded so a redelivered
    /// event produces the same signature.
    pub fn signature(&self) -> String {
        match self.record() {
            Some(payload) => format!("{}_{}", self.change_type, payload),
            None => self.change_type.to_string(),
        }
    }
}

/// What a transport channel is scoped to.
///
/// Serializes in the collaborator's change-feed configuration shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Change type to listen for
    pub event: ChangeType,

    /// Schema name
    pub schema: String,

    /// Table name
    pub table: String,

    /// Optional row filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<SubscriptionFilter>,
}

impl EventDescriptor {
    /// Create a new descriptor
    pub fn new(
        event: ChangeType,
        schema: &str,
        table: &str,
        filter: Option<SubscriptionFilter>,
    ) -> Self {
        Self {
            event,
            schema: schema.to_string(),
            table: table.to_string(),
            filter,
        }
    }
}
