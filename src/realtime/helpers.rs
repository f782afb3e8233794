//! Dashboard table subscriptions.
//!
//! Thin shortcuts for the tables the dashboard watches.

use std::sync::Arc;

use super::event::{ChangeEvent, ChangeType};
use super::manager::{RealtimeManager, SubscribeOptions, SubscriptionHandle};

/// Sensor readings table
pub const SENSOR_DATA_TABLE: &str = "sensor_data";
/// Watering zones table
pub const ZONES_TABLE: &str = "zones";
/// Alerts table
pub const ALERTS_TABLE: &str = "alerts";
/// Watering schedules table
pub const WATERING_SCHEDULES_TABLE: &str = "watering_schedules";
/// Devices table
pub const DEVICES_TABLE: &str = "devices";

/// New sensor readings only; readings are append-only so updates are
/// not interesting
pub fn sensor_data_subscription<F>(
    manager: &Arc<RealtimeManager>,
    callback: F,
) -> Option<SubscriptionHandle>
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    manager.subscribe(
        SENSOR_DATA_TABLE,
        callback,
        SubscribeOptions::default().with_event(ChangeType::Insert),
    )
}

/// All zone changes
pub fn zones_subscription<F>(
    manager: &Arc<RealtimeManager>,
    callback: F,
) -> Option<SubscriptionHandle>
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    manager.subscribe(ZONES_TABLE, callback, SubscribeOptions::default())
}

/// All alert changes
pub fn alerts_subscription<F>(
    manager: &Arc<RealtimeManager>,
    callback: F,
) -> Option<SubscriptionHandle>
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    manager.subscribe(ALERTS_TABLE, callback, SubscribeOptions::default())
}

/// All watering schedule changes
pub fn watering_schedules_subscription<F>(
    manager: &Arc<RealtimeManager>,
    callback: F,
) -> Option<SubscriptionHandle>
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    manager.subscribe(WATERING_SCHEDULES_TABLE, callback, SubscribeOptions::default())
}

/// All device changes
pub fn devices_subscription<F>(
    manager: &Arc<RealtimeManager>,
    callback: F,
) -> Option<SubscriptionHandle>
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    manager.subscribe(DEVICES_TABLE, callback, SubscribeOptions::default())
}
