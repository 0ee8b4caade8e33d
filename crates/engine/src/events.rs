// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Emitter handle threaded through every engine component.
//!
//! A thin clone of the daemon's broadcast channel. Emission is fire-and-
//! forget: a slow or absent subscriber never blocks the producer, and
//! dropped events are not redelivered.

use dl_core::Event;
use tokio::sync::broadcast;

/// Send-only handle for progress events.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<broadcast::Sender<Event>>,
}

impl EventSink {
    /// Sink feeding an existing broadcast channel.
    pub fn new(tx: broadcast::Sender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that discards everything (headless runs, tests that don't
    /// observe events).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Fresh channel plus a subscribed receiver, for tests.
    pub fn channel(capacity: usize) -> (Self, broadcast::Receiver<Event>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Emit an event. Never blocks, never fails.
    pub fn emit(&self, event: Event) {
        tracing::debug!(event = %event.log_summary(), "emit");
        if let Some(tx) = &self.tx {
            // Err means no live subscribers, which is fine
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
