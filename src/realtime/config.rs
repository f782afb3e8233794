//! # Realtime Configuration

use std::time::Duration;

/// Environment variable controlling debug-mode logging
pub const DEBUG_ENV_VAR: &str = "GARDENFLOW_DEBUG";

/// Configuration for the realtime manager
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Schema the change feed is scoped to (default: "public")
    pub schema: String,

    /// Retries before a key is abandoned (default: 5)
    pub max_reconnect_attempts: u32,

    /// First retry delay; doubles per attempt (default: 1s)
    pub base_reconnect_delay: Duration,

    /// Window within which identical events are suppressed when a
    /// subscription opts into deduplication (default: 1s)
    pub dedup_window: Duration,

    /// Verbose internal logging
    pub debug: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            max_reconnect_attempts: 5,
            base_reconnect_delay: Duration::from_millis(1000),
            dedup_window: Duration::from_millis(1000),
            debug: false,
        }
    }
}

impl RealtimeConfig {
    /// Default config with the debug flag read from the environment
    pub fn from_env() -> Self {
        Self {
            debug: debug_from_env(),
            ..Self::default()
        }
    }

    /// Config with debug logging enabled
    pub fn with_debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }
}

/// Both "1" and "true" enable debug mode
fn debug_from_env() -> bool {
    matches!(
        std::env::var(DEBUG_ENV_VAR).as_deref(),
        Ok("1") | Ok("true")
    )
}
