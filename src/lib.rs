//! gardenflow - Realtime data layer for the GardenFlow irrigation dashboard
//!
//! Subscription management, reconnection, and optimistic mutations over a
//! backend-as-a-service change feed.

pub mod observability;
pub mod realtime;
