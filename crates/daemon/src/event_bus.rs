// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus: best-effort broadcast of typed progress events.
//!
//! Push-only and topic-less. A slow or disconnected subscriber loses
//! events, never blocks a producer, and never gets redelivery. Clients are
//! tracked by an opaque socket id so the orchestrator can resolve ownership
//! on cancel and clean up on disconnect.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

use dl_core::{ClientId, Event};
use dl_engine::EventSink;

/// Default buffered events per subscriber before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A connected client as seen by the bus.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Set once the client identifies itself.
    pub user_name: Option<String>,
}

/// Broadcast fan-out plus the client registry.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    clients: Mutex<HashMap<ClientId, ClientInfo>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Send-only handle for engine components.
    pub fn sink(&self) -> EventSink {
        EventSink::new(self.tx.clone())
    }

    /// Emit one event to all current subscribers.
    pub fn emit(&self, event: Event) {
        tracing::debug!(event = %event.log_summary(), "bus emit");
        let _ = self.tx.send(event);
    }

    /// Register a client and return its event stream.
    pub fn subscribe(&self, client_id: ClientId) -> broadcast::Receiver<Event> {
        self.clients.lock().insert(client_id, ClientInfo::default());
        self.tx.subscribe()
    }

    /// Attach a user name to a connected client.
    pub fn identify(&self, client_id: &ClientId, user_name: &str) -> bool {
        let mut clients = self.clients.lock();
        match clients.get_mut(client_id) {
            Some(info) => {
                info.user_name = Some(user_name.to_string());
                true
            }
            None => false,
        }
    }

    /// Resolve the user behind a socket id.
    pub fn user_of(&self, client_id: &ClientId) -> Option<String> {
        self.clients
            .lock()
            .get(client_id)
            .and_then(|info| info.user_name.clone())
    }

    /// Forget a client. Returns its info when it was known.
    pub fn disconnect(&self, client_id: &ClientId) -> Option<ClientInfo> {
        self.clients.lock().remove(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
