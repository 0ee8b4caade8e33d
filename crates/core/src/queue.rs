// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue item and state machine for admitted test submissions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device::DeviceId;
use crate::step::ScenarioId;
use crate::ClientId;

crate::define_id! {
    /// Identifier assigned to an admitted submission.
    pub struct QueueId;
}

crate::define_id! {
    /// Identifier of one active Test Executor run. Equal to the queue id of
    /// the item that was dispatched.
    pub struct ExecutionId;
}

/// Submission priority. Higher runs first; ties break on submission time.
pub type Priority = u8;

/// Lifecycle of a queue item. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Queued,
    Running,
    /// Dispatched on a subset of the requested devices; a clone covers the rest.
    Split,
    Completed,
    Failed,
    Cancelled,
}

impl QueueState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueState::Completed | QueueState::Failed | QueueState::Cancelled
        )
    }

    /// Whether a transition to `next` is a legal forward move.
    pub fn can_transition(&self, next: QueueState) -> bool {
        use QueueState::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Split)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Split, Completed)
                | (Split, Failed)
                | (Split, Cancelled)
        )
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueState::Queued => write!(f, "queued"),
            QueueState::Running => write!(f, "running"),
            QueueState::Split => write!(f, "split"),
            QueueState::Completed => write!(f, "completed"),
            QueueState::Failed => write!(f, "failed"),
            QueueState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A user's test submission as received at the admission boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequest {
    pub device_ids: Vec<DeviceId>,
    pub scenario_ids: Vec<ScenarioId>,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    /// Pause between scenarios on each device, in milliseconds.
    #[serde(default)]
    pub scenario_interval_ms: u64,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    /// Opt-in: run immediately on whatever subset of devices is idle and
    /// requeue a clone for the remainder.
    #[serde(default)]
    pub split_execution: bool,
}

fn default_repeat_count() -> u32 {
    1
}

/// One admitted submission tracked by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub queue_id: QueueId,
    pub user_name: String,
    pub socket_id: ClientId,
    pub device_ids: Vec<DeviceId>,
    pub scenario_ids: Vec<ScenarioId>,
    pub repeat_count: u32,
    pub scenario_interval_ms: u64,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    pub submitted_at_ms: u64,
    pub state: QueueState,
    #[serde(default)]
    pub split_execution: bool,
    /// Parent queue id when this item is the remainder clone of a split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_parent: Option<QueueId>,
}

impl QueueItem {
    /// Apply a forward state transition. Returns false (and leaves the state
    /// untouched) when the move is not legal.
    pub fn transition(&mut self, next: QueueState) -> bool {
        if self.state.can_transition(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}

/// Introspection row for one queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatusEntry {
    pub queue_id: QueueId,
    pub user_name: String,
    pub state: QueueState,
    pub priority: Priority,
    pub device_ids: Vec<DeviceId>,
    pub submitted_at_ms: u64,
    /// Worst-case position across the requested devices (0 = running/next).
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_ms: Option<u64>,
}

/// Introspection row for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceQueueStatus {
    pub device_id: DeviceId,
    pub busy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_queue_id: Option<QueueId>,
    pub waiting: usize,
}

/// Per-device progress inside a running execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProgress {
    pub device_id: DeviceId,
    pub completed: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scenario: Option<ScenarioId>,
    pub failed: bool,
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
