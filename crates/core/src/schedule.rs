// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring schedule documents and history entries.

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::step::ScenarioId;

crate::define_id! {
    /// Identifier of a stored schedule document.
    pub struct ScheduleId;
}

/// A cron-driven recurring launch.
///
/// Invariant: while `enabled`, exactly one live trigger is registered with
/// the schedule manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub scenario_id: ScenarioId,
    pub device_ids: Vec<DeviceId>,
    /// POSIX 5-field expression: minute hour day-of-month month day-of-week.
    pub cron_expression: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
}

/// Why a fire did or did not launch a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOutcome {
    Triggered,
    Skipped,
    Failed,
}

/// One history record per fire, kept in a bounded ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleHistoryEntry {
    pub schedule_id: ScheduleId,
    pub schedule_name: String,
    pub fired_at_ms: u64,
    pub outcome: ScheduleOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<crate::report::ReportId>,
}
