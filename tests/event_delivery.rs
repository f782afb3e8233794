//! Event Delivery Invariant Tests
//!
//! - Deduplication: one delivery per signature inside the window, a
//!   fresh delivery after it elapses
//! - A panicking callback never disturbs the channel or later events
//! - Per-channel ordering is preserved; payloads pass through verbatim

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use gardenflow::realtime::{
    ChangeEvent, ChannelState, ChannelStatus, SubscribeOptions, SubscriptionKey,
};

use common::{manager_with, MockTransport};

fn collecting_sink() -> (
    impl Fn(ChangeEvent) + Send + Sync + 'static,
    Arc<Mutex<Vec<ChangeEvent>>>,
) {
    let received: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    (move |event| sink.lock().unwrap().push(event), received)
}

// =============================================================================
// Deduplication
// =============================================================================

/// Identical events inside the window collapse to one delivery.
#[tokio::test(start_paused = true)]
async fn test_dedup_single_delivery_within_window() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);
    let (sink, received) = collecting_sink();

    manager
        .subscribe(
            "sensor_data",
            sink,
            SubscribeOptions::default().with_deduplication(None),
        )
        .unwrap();
    transport.set_status("sensor_data", ChannelStatus::Subscribed, None);

    for _ in 0..3 {
        transport.emit(
            "sensor_data",
            ChangeEvent::insert(json!({"id": 1, "temperature": 25.5})),
        );
    }

    assert_eq!(received.lock().unwrap().len(), 1);
}

/// After the window elapses, the same signature delivers again.
#[tokio::test(start_paused = true)]
async fn test_dedup_redelivers_after_window() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);
    let (sink, received) = collecting_sink();

    manager
        .subscribe(
            "sensor_data",
            sink,
            SubscribeOptions::default().with_deduplication(None),
        )
        .unwrap();

    transport.emit("sensor_data", ChangeEvent::insert(json!({"id": 1})));
    tokio::time::advance(Duration::from_millis(1001)).await;
    transport.emit("sensor_data", ChangeEvent::insert(json!({"id": 1})));

    assert_eq!(received.lock().unwrap().len(), 2);
}

/// A per-subscription window overrides the configured default.
#[tokio::test(start_paused = true)]
async fn test_dedup_custom_window() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);
    let (sink, received) = collecting_sink();

    manager
        .subscribe(
            "sensor_data",
            sink,
            SubscribeOptions::default().with_deduplication(Some(Duration::from_millis(500))),
        )
        .unwrap();

    transport.emit("sensor_data", ChangeEvent::insert(json!({"id": 1})));
    tokio::time::advance(Duration::from_millis(501)).await;
    transport.emit("sensor_data", ChangeEvent::insert(json!({"id": 1})));

    assert_eq!(received.lock().unwrap().len(), 2);
}

/// Different payloads never collide.
#[tokio::test(start_paused = true)]
async fn test_dedup_distinguishes_payloads() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);
    let (sink, received) = collecting_sink();

    manager
        .subscribe(
            "sensor_data",
            sink,
            SubscribeOptions::default().with_deduplication(None),
        )
        .unwrap();

    transport.emit("sensor_data", ChangeEvent::insert(json!({"id": 1})));
    transport.emit("sensor_data", ChangeEvent::insert(json!({"id": 2})));

    assert_eq!(received.lock().unwrap().len(), 2);
}

// =============================================================================
// Callback isolation
// =============================================================================

/// A panicking callback leaves the channel subscribed and later events
/// still arrive.
#[tokio::test]
async fn test_callback_panic_leaves_channel_subscribed() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);

    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    manager
        .subscribe(
            "alerts",
            move |_event| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    panic!("deliberate test panic");
                }
            },
            SubscribeOptions::default(),
        )
        .unwrap();
    transport.set_status("alerts", ChannelStatus::Subscribed, None);

    transport.emit("alerts", ChangeEvent::insert(json!({"id": 1})));
    transport.emit("alerts", ChangeEvent::insert(json!({"id": 2})));

    assert_eq!(invocations.load(Ordering::SeqCst), 2);

    let status = manager.subscription_status();
    let alerts = &status[&SubscriptionKey::new("alerts", None)];
    assert_eq!(alerts.state, ChannelState::Subscribed);
}

// =============================================================================
// Ordering and pass-through
// =============================================================================

/// Events arrive in emit order.
#[tokio::test]
async fn test_events_delivered_in_order() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);
    let (sink, received) = collecting_sink();

    manager
        .subscribe("sensor_data", sink, SubscribeOptions::default())
        .unwrap();

    for id in 1..=5 {
        transport.emit("sensor_data", ChangeEvent::insert(json!({"id": id})));
    }

    let events = received.lock().unwrap();
    let ids: Vec<i64> = events
        .iter()
        .map(|event| event.new_record.as_ref().unwrap()["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

/// Old and new records pass through untransformed.
#[tokio::test]
async fn test_payloads_verbatim() {
    let transport = MockTransport::new();
    let manager = manager_with(&transport);
    let (sink, received) = collecting_sink();

    manager
        .subscribe("zones", sink, SubscribeOptions::default())
        .unwrap();

    transport.emit(
        "zones",
        ChangeEvent::update(json!({"id": 3, "active": false}), json!({"id": 3, "active": true})),
    );
    transport.emit("zones", ChangeEvent::delete(json!({"id": 4})));

    let events = received.lock().unwrap();
    assert_eq!(events[0].old_record, Some(json!({"id": 3, "active": false})));
    assert_eq!(events[0].new_record, Some(json!({"id": 3, "active": true})));
    assert_eq!(events[1].old_record, Some(json!({"id": 4})));
    assert!(events[1].new_record.is_none());
}
