// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types pushed to connected clients.
//!
//! Serializes with `{"type": "name:with:colons", ...fields}` format, the
//! wire shape consumed by the dashboard. Delivery is best-effort: slow
//! subscribers lose events, producers never block.

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::queue::{DeviceProgress, DeviceQueueStatus, ExecutionId, QueueId, QueueState, QueueStatusEntry};
use crate::report::{ReportId, TestRunStatus};
use crate::schedule::ScheduleId;
use crate::step::ScenarioId;

/// Node execution phase carried by `test:device:node` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    Running,
    Waiting,
    Passed,
    Failed,
}

/// Progress events pushed to subscribed clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- queue --
    #[serde(rename = "queue:submitted")]
    QueueSubmitted {
        queue_id: QueueId,
        user_name: String,
        state: QueueState,
        position: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_wait_ms: Option<u64>,
    },

    #[serde(rename = "queue:assigned")]
    QueueAssigned {
        queue_id: QueueId,
        execution_id: ExecutionId,
        device_ids: Vec<DeviceId>,
    },

    #[serde(rename = "queue:position")]
    QueuePosition {
        queue_id: QueueId,
        device_id: DeviceId,
        position: usize,
    },

    #[serde(rename = "queue:cancel:response")]
    QueueCancelResponse {
        queue_id: QueueId,
        success: bool,
        message: String,
    },

    #[serde(rename = "queue:status:response")]
    QueueStatusResponse {
        queue: Vec<QueueStatusEntry>,
        device_statuses: Vec<DeviceQueueStatus>,
    },

    // -- test executor --
    #[serde(rename = "test:preparing")]
    TestPreparing { execution_id: ExecutionId },

    #[serde(rename = "test:session:validating")]
    TestSessionValidating {
        execution_id: ExecutionId,
        device_ids: Vec<DeviceId>,
    },

    #[serde(rename = "test:session:recreated")]
    TestSessionRecreated {
        execution_id: ExecutionId,
        device_ids: Vec<DeviceId>,
    },

    #[serde(rename = "test:session:failed")]
    TestSessionFailed {
        execution_id: ExecutionId,
        device_ids: Vec<DeviceId>,
    },

    #[serde(rename = "test:scenarios:skipped")]
    TestScenariosSkipped {
        execution_id: ExecutionId,
        scenario_ids: Vec<ScenarioId>,
    },

    #[serde(rename = "test:start")]
    TestStart {
        execution_id: ExecutionId,
        device_ids: Vec<DeviceId>,
        total_scenarios: usize,
    },

    #[serde(rename = "test:device:start")]
    TestDeviceStart {
        execution_id: ExecutionId,
        device_id: DeviceId,
    },

    #[serde(rename = "test:device:scenario:start")]
    TestDeviceScenarioStart {
        execution_id: ExecutionId,
        device_id: DeviceId,
        scenario_id: ScenarioId,
        scenario_name: String,
        repeat_index: u32,
        order: usize,
    },

    #[serde(rename = "test:device:node")]
    TestDeviceNode {
        execution_id: ExecutionId,
        device_id: DeviceId,
        scenario_id: ScenarioId,
        node_id: String,
        node_name: String,
        status: NodeRunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "test:device:scenario:complete")]
    TestDeviceScenarioComplete {
        execution_id: ExecutionId,
        device_id: DeviceId,
        scenario_id: ScenarioId,
        repeat_index: u32,
        success: bool,
        duration_ms: u64,
    },

    #[serde(rename = "test:device:complete")]
    TestDeviceComplete {
        execution_id: ExecutionId,
        device_id: DeviceId,
        success: bool,
    },

    #[serde(rename = "test:progress")]
    TestProgress {
        execution_id: ExecutionId,
        completed: usize,
        total: usize,
        percentage: u8,
        per_device: Vec<DeviceProgress>,
    },

    #[serde(rename = "test:complete")]
    TestComplete {
        execution_id: ExecutionId,
        status: TestRunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_id: Option<ReportId>,
    },

    #[serde(rename = "test:stopping")]
    TestStopping { execution_id: ExecutionId },

    // -- parallel dispatcher --
    #[serde(rename = "parallel:start")]
    ParallelStart {
        report_id: ReportId,
        scenario_id: ScenarioId,
        device_ids: Vec<DeviceId>,
    },

    #[serde(rename = "parallel:complete")]
    ParallelComplete {
        report_id: ReportId,
        passed: usize,
        failed: usize,
        duration_ms: u64,
    },

    // -- schedules --
    #[serde(rename = "schedule:start")]
    ScheduleStart {
        schedule_id: ScheduleId,
        name: String,
    },

    #[serde(rename = "schedule:complete")]
    ScheduleComplete {
        schedule_id: ScheduleId,
        name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    // -- errors --
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
}

impl Event {
    /// Wire tag of this event (the serialized `type` field).
    pub fn kind(&self) -> &'static str {
        match self {
            Event::QueueSubmitted { .. } => "queue:submitted",
            Event::QueueAssigned { .. } => "queue:assigned",
            Event::QueuePosition { .. } => "queue:position",
            Event::QueueCancelResponse { .. } => "queue:cancel:response",
            Event::QueueStatusResponse { .. } => "queue:status:response",
            Event::TestPreparing { .. } => "test:preparing",
            Event::TestSessionValidating { .. } => "test:session:validating",
            Event::TestSessionRecreated { .. } => "test:session:recreated",
            Event::TestSessionFailed { .. } => "test:session:failed",
            Event::TestScenariosSkipped { .. } => "test:scenarios:skipped",
            Event::TestStart { .. } => "test:start",
            Event::TestDeviceStart { .. } => "test:device:start",
            Event::TestDeviceScenarioStart { .. } => "test:device:scenario:start",
            Event::TestDeviceNode { .. } => "test:device:node",
            Event::TestDeviceScenarioComplete { .. } => "test:device:scenario:complete",
            Event::TestDeviceComplete { .. } => "test:device:complete",
            Event::TestProgress { .. } => "test:progress",
            Event::TestComplete { .. } => "test:complete",
            Event::TestStopping { .. } => "test:stopping",
            Event::ParallelStart { .. } => "parallel:start",
            Event::ParallelComplete { .. } => "parallel:complete",
            Event::ScheduleStart { .. } => "schedule:start",
            Event::ScheduleComplete { .. } => "schedule:complete",
            Event::Error { .. } => "error",
        }
    }

    /// One-line summary for structured logging.
    pub fn log_summary(&self) -> String {
        match self {
            Event::QueueSubmitted {
                queue_id, position, ..
            } => format!("{} {} pos={}", self.kind(), queue_id, position),
            Event::QueueAssigned {
                queue_id,
                device_ids,
                ..
            } => format!("{} {} devices={}", self.kind(), queue_id, device_ids.len()),
            Event::QueuePosition {
                queue_id, position, ..
            } => format!("{} {} pos={}", self.kind(), queue_id, position),
            Event::QueueCancelResponse {
                queue_id, success, ..
            } => format!("{} {} ok={}", self.kind(), queue_id, success),
            Event::QueueStatusResponse { queue, .. } => {
                format!("{} items={}", self.kind(), queue.len())
            }
            Event::TestPreparing { execution_id }
            | Event::TestStopping { execution_id } => {
                format!("{} {}", self.kind(), execution_id)
            }
            Event::TestSessionValidating {
                execution_id,
                device_ids,
            }
            | Event::TestSessionRecreated {
                execution_id,
                device_ids,
            }
            | Event::TestSessionFailed {
                execution_id,
                device_ids,
            } => format!(
                "{} {} devices={}",
                self.kind(),
                execution_id,
                device_ids.len()
            ),
            Event::TestScenariosSkipped {
                execution_id,
                scenario_ids,
            } => format!(
                "{} {} skipped={}",
                self.kind(),
                execution_id,
                scenario_ids.len()
            ),
            Event::TestStart {
                execution_id,
                total_scenarios,
                ..
            } => format!("{} {} total={}", self.kind(), execution_id, total_scenarios),
            Event::TestDeviceStart { device_id, .. }
            | Event::TestDeviceComplete { device_id, .. } => {
                format!("{} {}", self.kind(), device_id)
            }
            Event::TestDeviceScenarioStart {
                device_id,
                scenario_id,
                repeat_index,
                ..
            } => format!(
                "{} {} {} r{}",
                self.kind(),
                device_id,
                scenario_id,
                repeat_index
            ),
            Event::TestDeviceNode {
                device_id,
                node_id,
                status,
                ..
            } => format!("{} {} {} {:?}", self.kind(), device_id, node_id, status),
            Event::TestDeviceScenarioComplete {
                device_id,
                scenario_id,
                success,
                ..
            } => format!("{} {} {} ok={}", self.kind(), device_id, scenario_id, success),
            Event::TestProgress {
                execution_id,
                percentage,
                ..
            } => format!("{} {} {}%", self.kind(), execution_id, percentage),
            Event::TestComplete {
                execution_id,
                status,
                ..
            } => format!("{} {} {}", self.kind(), execution_id, status),
            Event::ParallelStart {
                report_id,
                device_ids,
                ..
            } => format!("{} {} devices={}", self.kind(), report_id, device_ids.len()),
            Event::ParallelComplete {
                report_id,
                passed,
                failed,
                ..
            } => format!("{} {} {}/{}", self.kind(), report_id, passed, passed + failed),
            Event::ScheduleStart { schedule_id, name } => {
                format!("{} {} ({})", self.kind(), schedule_id, name)
            }
            Event::ScheduleComplete {
                schedule_id,
                success,
                ..
            } => format!("{} {} ok={}", self.kind(), schedule_id, success),
            Event::Error { message, .. } => format!("{} {}", self.kind(), message),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
