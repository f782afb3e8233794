//! # GardenFlow Realtime Module
//!
//! Client-side subscription management over the backend change feed.
//!
//! ## Architecture
//!
//! - **Manager**: key → channel registry and lifecycle state
//! - **Reconnect**: exponential-backoff retry on channel failure
//! - **Dispatcher**: callback wrapping with panic isolation and deduplication
//! - **Mutation**: optimistic local updates with revert-on-failure
//! - **Polling**: periodic-refresh fallback when no channel is available
//! - **Transport**: the seam to the backend change-feed client

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod filter;
pub mod helpers;
pub mod manager;
pub mod mutation;
pub mod polling;
pub mod reconnect;
pub mod transport;

pub use config::RealtimeConfig;
pub use dispatcher::{EventCallback, EventDispatcher};
pub use errors::{RealtimeError, RealtimeResult};
pub use event::{ChangeEvent, ChangeType, EventDescriptor};
pub use filter::{FilterOp, SubscriptionFilter, SubscriptionKey};
pub use manager::{
    ChannelState, RealtimeManager, SubscribeOptions, SubscriptionHandle, SubscriptionStatus,
};
pub use mutation::Mutation;
pub use polling::{start_polling, PollingHandle};
pub use reconnect::ReconnectionController;
pub use transport::{
    ChangeFeedTransport, ChannelHandle, ChannelStatus, EventHandler, StatusHandler,
};
