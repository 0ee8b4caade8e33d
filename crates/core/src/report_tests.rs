// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::step::StepResult;

fn result(device: &str, success: bool, duration_ms: u64) -> DeviceScenarioResult {
    DeviceScenarioResult {
        device_id: DeviceId::new(device),
        scenario_id: ScenarioId::new("s1"),
        scenario_name: "login".into(),
        success,
        duration_ms,
        error: None,
        steps: Vec::<StepResult>::new(),
        screenshots: Vec::new(),
        video: None,
    }
}

#[test]
fn report_id_prefixes() {
    assert_eq!(ReportId::parallel(1234).as_str(), "pr-1234");
    assert_eq!(ReportId::test(1234).as_str(), "tr-1234");
}

#[test]
fn stats_from_results() {
    let results = vec![result("A", true, 100), result("B", false, 300)];
    let stats = ReportStats::from_results(&results);
    assert_eq!(stats.passed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total_duration_ms, 400);
    assert_eq!(stats.avg_duration_ms, 200);
}

#[test]
fn stats_from_empty_results() {
    let stats = ReportStats::from_results(&[]);
    assert_eq!(stats.passed, 0);
    assert_eq!(stats.avg_duration_ms, 0);
}

#[test]
fn run_status_display() {
    assert_eq!(TestRunStatus::Partial.to_string(), "partial");
    assert_eq!(TestRunStatus::Stopped.to_string(), "stopped");
}
