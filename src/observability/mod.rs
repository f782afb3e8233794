//! # Observability
//!
//! Structured logging for the realtime layer.

pub mod logger;

pub use logger::{RealtimeLogger, Severity};
