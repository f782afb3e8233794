//! # Subscription Filters and Keys
//!
//! Structured filter predicates and the composite registry key derived
//! from them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter operator for subscription predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription filter on a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Column to filter on
    pub column: String,
    /// Operator
    pub op: FilterOp,
    /// Value to compare
    pub value: Value,
}

impl SubscriptionFilter {
    /// Create a new filter
    pub fn new(column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    /// Equality filter shorthand
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// Canonical `column=op.value` rendering.
    ///
    /// Every filter has exactly one canonical form, so key equality never
    /// depends on how the filter was spelled. The value is serialized as
    /// compact JSON.
    pub fn canonical(&self) -> String {
        format!("{}={}.{}", self.column, self.op, self.value)
    }
}

impl fmt::Display for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Composite registry key: table plus canonical filter.
///
/// Two subscribe calls with the same (table, filter) always resolve to the
/// same key. Event-type is a channel scoping parameter and is deliberately
/// not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    table: String,
    filter: Option<String>,
}

impl SubscriptionKey {
    /// Derive the key for a table and optional filter
    pub fn new(table: &str, filter: Option<&SubscriptionFilter>) -> Self {
        Self {
            table: table.to_string(),
            filter: filter.map(SubscriptionFilter::canonical),
        }
    }

    /// Table component
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Canonical filter component, if any
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{}[{}]", self.table, filter),
            None => write!(f, "{}", self.table),
        }
    }
}
