//! # Realtime Errors
//!
//! Error types for the realtime module.

use thiserror::Error;

use super::filter::SubscriptionKey;

/// Result type for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Realtime errors
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    /// Change-feed client not initialized; callers fall back to polling
    #[error("Realtime transport not available")]
    TransportUnavailable,

    /// Reconnection abandoned for a key; the entry is left dead and the
    /// caller must re-subscribe explicitly
    #[error("Max reconnection attempts reached for {key}")]
    MaxRetriesExceeded {
        /// Subscription key that exhausted its retries
        key: SubscriptionKey,
    },

    /// Unknown mutation operation name, rejected before any local change
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Remote insert/update/delete failed; surfaced after the local revert
    #[error("Mutation failed: {0}")]
    Mutation(String),
}
