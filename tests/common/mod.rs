//! Shared test transport for realtime integration tests.
//!
//! Stands in for the backend change-feed client: records every channel
//! the manager opens, lets tests emit events and status transitions, and
//! answers row mutations with configurable failures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use gardenflow::realtime::{
    ChangeEvent, ChangeFeedTransport, ChannelHandle, ChannelStatus, EventDescriptor, EventHandler,
    RealtimeConfig, RealtimeError, RealtimeManager, RealtimeResult, StatusHandler,
};

pub struct MockChannel {
    pub handle: ChannelHandle,
    pub descriptor: EventDescriptor,
    pub on_event: EventHandler,
    pub on_status: StatusHandler,
    pub closed: bool,
}

#[derive(Default)]
pub struct MockTransport {
    channels: Mutex<Vec<MockChannel>>,
    fail_mutations: AtomicBool,
    mutation_calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent row mutations fail
    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Channels ever opened, including closed ones
    pub fn total_channels(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    /// Channels currently open
    pub fn open_channels(&self) -> usize {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.closed)
            .count()
    }

    /// Descriptor of the Nth channel in open order
    pub fn descriptor(&self, index: usize) -> EventDescriptor {
        self.channels.lock().unwrap()[index].descriptor.clone()
    }

    /// Wire name of the Nth channel in open order
    pub fn channel_name(&self, index: usize) -> String {
        self.channels.lock().unwrap()[index].handle.name.clone()
    }

    /// Recorded mutation calls, in order
    pub fn mutation_calls(&self) -> Vec<String> {
        self.mutation_calls.lock().unwrap().clone()
    }

    fn latest_open(&self, table: &str) -> Option<(EventHandler, StatusHandler)> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| !c.closed && c.descriptor.table == table)
            .map(|c| (Arc::clone(&c.on_event), Arc::clone(&c.on_status)))
    }

    /// Emit an event on the most recent open channel for a table
    pub fn emit(&self, table: &str, event: ChangeEvent) {
        let (on_event, _) = self
            .latest_open(table)
            .unwrap_or_else(|| panic!("no open channel for {}", table));
        on_event(event);
    }

    /// Report a status on the most recent open channel for a table
    pub fn set_status(&self, table: &str, status: ChannelStatus, error: Option<&str>) {
        let (_, on_status) = self
            .latest_open(table)
            .unwrap_or_else(|| panic!("no open channel for {}", table));
        on_status(status, error.map(String::from));
    }

    /// Report a status on a specific channel by open order, even if it
    /// has since been closed or replaced
    pub fn set_status_at(&self, index: usize, status: ChannelStatus, error: Option<&str>) {
        let on_status = {
            let channels = self.channels.lock().unwrap();
            Arc::clone(&channels[index].on_status)
        };
        on_status(status, error.map(String::from));
    }
}

#[async_trait]
impl ChangeFeedTransport for MockTransport {
    fn open_channel(
        &self,
        name: &str,
        descriptor: EventDescriptor,
        on_event: EventHandler,
        on_status: StatusHandler,
    ) -> ChannelHandle {
        let handle = ChannelHandle::new(name);
        self.channels.lock().unwrap().push(MockChannel {
            handle: handle.clone(),
            descriptor,
            on_event,
            on_status,
            closed: false,
        });
        handle
    }

    fn close_channel(&self, handle: &ChannelHandle) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels.iter_mut().find(|c| c.handle.id == handle.id) {
            channel.closed = true;
        }
    }

    async fn insert(&self, table: &str, row: Value) -> RealtimeResult<Value> {
        self.mutation_calls
            .lock()
            .unwrap()
            .push(format!("insert:{}", table));
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(RealtimeError::Mutation("remote insert rejected".to_string()));
        }
        Ok(row)
    }

    async fn update(&self, table: &str, id: &Value, changes: Value) -> RealtimeResult<Value> {
        self.mutation_calls
            .lock()
            .unwrap()
            .push(format!("update:{}:{}", table, id));
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(RealtimeError::Mutation("remote update rejected".to_string()));
        }
        let mut record = changes;
        if let Some(object) = record.as_object_mut() {
            object.insert("id".to_string(), id.clone());
        }
        Ok(record)
    }

    async fn delete(&self, table: &str, id: &Value) -> RealtimeResult<()> {
        self.mutation_calls
            .lock()
            .unwrap()
            .push(format!("delete:{}:{}", table, id));
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(RealtimeError::Mutation("remote delete rejected".to_string()));
        }
        Ok(())
    }
}

/// Manager wired to the mock transport with default config
pub fn manager_with(transport: &Arc<MockTransport>) -> Arc<RealtimeManager> {
    manager_with_config(transport, RealtimeConfig::default())
}

/// Manager wired to the mock transport with a custom config
pub fn manager_with_config(
    transport: &Arc<MockTransport>,
    config: RealtimeConfig,
) -> Arc<RealtimeManager> {
    RealtimeManager::new(
        Some(Arc::clone(transport) as Arc<dyn ChangeFeedTransport>),
        config,
    )
}

/// Let spawned tasks run up to their next await point
pub async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}
