// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable report aggregates persisted after a run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device::DeviceId;
use crate::queue::ExecutionId;
use crate::step::{DeviceScenarioResult, ScenarioId};

crate::define_id! {
    /// Identifier of a persisted report document.
    ///
    /// Pre-allocated before the run starts so every artifact (screenshot,
    /// video) can reference it.
    pub struct ReportId;
}

impl ReportId {
    /// Report id for a parallel run: `pr-<epoch-ms>`.
    pub fn parallel(epoch_ms: u64) -> Self {
        Self::new(format!("pr-{}", epoch_ms))
    }

    /// Report id for a sequenced test run: `tr-<epoch-ms>`.
    pub fn test(epoch_ms: u64) -> Self {
        Self::new(format!("tr-{}", epoch_ms))
    }
}

/// Aggregate counters over device results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub passed: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
    pub avg_duration_ms: u64,
}

impl ReportStats {
    /// Compute stats from a slice of device results.
    pub fn from_results(results: &[DeviceScenarioResult]) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let total_duration_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
        let avg_duration_ms = if results.is_empty() {
            0
        } else {
            total_duration_ms / results.len() as u64
        };
        Self {
            passed,
            failed,
            total_duration_ms,
            avg_duration_ms,
        }
    }
}

/// Report for one scenario fanned out across devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelReport {
    pub report_id: ReportId,
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub device_results: Vec<DeviceScenarioResult>,
    pub stats: ReportStats,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

/// Final status of a sequenced test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestRunStatus {
    Completed,
    /// Some scenarios passed and some failed.
    Partial,
    Failed,
    Stopped,
}

impl fmt::Display for TestRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestRunStatus::Completed => write!(f, "completed"),
            TestRunStatus::Partial => write!(f, "partial"),
            TestRunStatus::Failed => write!(f, "failed"),
            TestRunStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Results for one `(scenario, repeat)` pair aggregated across devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioExecutionSummary {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub repeat_index: u32,
    pub device_results: Vec<DeviceScenarioResult>,
    pub passed: usize,
    pub failed: usize,
}

/// Report for one sequenced test run across devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub report_id: ReportId,
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    pub user_name: String,
    pub status: TestRunStatus,
    pub device_ids: Vec<DeviceId>,
    pub summaries: Vec<ScenarioExecutionSummary>,
    pub stats: ReportStats,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
