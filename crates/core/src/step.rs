// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node step outcomes and per-device scenario results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Identifier of a stored scenario document.
    pub struct ScenarioId;
}

/// Outcome of one interpreted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Error,
    /// Intermediate marker while an action blocks on a wait. Always followed
    /// by a terminal status for the same node in the event stream.
    Waiting,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Waiting)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Passed => write!(f, "passed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Error => write!(f, "error"),
            StepStatus::Waiting => write!(f, "waiting"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Distinguishes an expected timeout from a driver fault.
///
/// Timeouts mark the step `failed`; driver faults mark it `error`. The
/// distinction drives screenshot capture policy and report tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Timeout,
    Runtime,
}

/// Recorded outcome for one executed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub status: StepStatus,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<FailureType>,
}

impl StepResult {
    /// Start a step record at the given instant.
    pub fn begin(node_id: &str, node_name: &str, node_type: &str, now_ms: u64) -> Self {
        Self {
            node_id: node_id.to_string(),
            node_name: node_name.to_string(),
            node_type: node_type.to_string(),
            status: StepStatus::Waiting,
            start_ms: now_ms,
            end_ms: now_ms,
            duration_ms: 0,
            error: None,
            failure_type: None,
        }
    }

    /// Finalize with a terminal status.
    pub fn finish(&mut self, status: StepStatus, now_ms: u64) {
        self.status = status;
        self.end_ms = now_ms;
        self.duration_ms = now_ms.saturating_sub(self.start_ms);
    }
}

/// Kind of a captured screenshot artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotKind {
    Step,
    Final,
    Failed,
    Highlight,
}

impl fmt::Display for ScreenshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenshotKind::Step => write!(f, "step"),
            ScreenshotKind::Final => write!(f, "final"),
            ScreenshotKind::Failed => write!(f, "failed"),
            ScreenshotKind::Highlight => write!(f, "highlight"),
        }
    }
}

/// Reference to a persisted screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRef {
    pub node_id: String,
    pub kind: ScreenshotKind,
    pub path: PathBuf,
}

/// Outcome of one scenario on one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceScenarioResult {
    pub device_id: crate::device::DeviceId,
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub screenshots: Vec<ScreenshotRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
