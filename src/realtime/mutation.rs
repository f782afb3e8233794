//! # Optimistic Mutations
//!
//! Local state first, remote call second, revert on failure. Exactly one
//! of commit or revert happens per call.

use serde_json::Value;

use crate::observability::logger::RealtimeLogger;

use super::errors::{RealtimeError, RealtimeResult};
use super::transport::ChangeFeedTransport;

/// A single-row mutation against one table.
///
/// No cross-record atomicity: each value mutates exactly one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a new row
    Insert {
        /// Row data
        row: Value,
    },
    /// Update the row with the given id
    Update {
        /// Row id
        id: Value,
        /// Columns to change
        changes: Value,
    },
    /// Delete the row with the given id
    Delete {
        /// Row id
        id: Value,
    },
}

impl Mutation {
    /// Build a mutation from a dynamic operation name and its data.
    ///
    /// Unknown names fail here, before any local state is touched. Update
    /// data carries `{id, updates}`; delete data carries `{id}`.
    pub fn from_parts(operation: &str, data: Value) -> RealtimeResult<Self> {
        match operation {
            "insert" => Ok(Mutation::Insert { row: data }),
            "update" => Ok(Mutation::Update {
                id: data.get("id").cloned().unwrap_or(Value::Null),
                changes: data.get("updates").cloned().unwrap_or(Value::Null),
            }),
            "delete" => Ok(Mutation::Delete {
                id: data.get("id").cloned().unwrap_or(Value::Null),
            }),
            other => Err(RealtimeError::UnsupportedOperation(other.to_string())),
        }
    }

    /// Operation name
    pub fn operation(&self) -> &'static str {
        match self {
            Mutation::Insert { .. } => "insert",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Apply the local update, run the remote mutation, revert on failure.
///
/// Returns the server-confirmed record for insert/update, None for delete.
pub(crate) async fn run<A, R>(
    transport: &dyn ChangeFeedTransport,
    logger: &RealtimeLogger,
    table: &str,
    mutation: Mutation,
    apply_local: A,
    revert_local: R,
) -> RealtimeResult<Option<Value>>
where
    A: FnOnce(&Mutation) + Send,
    R: FnOnce(&Mutation) + Send,
{
    // Local state reflects the change before the remote call is issued
    apply_local(&mutation);

    let result = match &mutation {
        Mutation::Insert { row } => transport.insert(table, row.clone()).await.map(Some),
        Mutation::Update { id, changes } => {
            transport.update(table, id, changes.clone()).await.map(Some)
        }
        Mutation::Delete { id } => transport.delete(table, id).await.map(|_| None),
    };

    match result {
        Ok(record) => Ok(record),
        Err(err) => {
            let err_str = err.to_string();
            logger.warn(
                "REALTIME_MUTATION_REVERTED",
                &[
                    ("error", &err_str),
                    ("operation", mutation.operation()),
                    ("table", table),
                ],
            );
            revert_local(&mutation);
            Err(err)
        }
    }
}
