// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod actions;
mod cancel;
mod control_flow;

use super::*;
use crate::test_helpers::{
    action, branch_conn, condition, conn, count_loop, drain_events, harness, node, scenario,
    tap_scenario, Harness,
};
use dl_core::{ExecutionId, ReportId};
use dl_scenario::{ActionKind, NodeKind, Scenario};

pub(super) async fn run_scenario(h: &mut Harness, scenario: &Scenario) -> DeviceScenarioResult {
    run_with(h, scenario, &StopSignal::new(), CaptureOptions::default()).await
}

pub(super) async fn run_with(
    h: &mut Harness,
    scenario: &Scenario,
    stop: &StopSignal,
    capture: CaptureOptions,
) -> DeviceScenarioResult {
    let device_id = DeviceId::new("A");
    let session = h.registry.ensure_session(&device_id).await.unwrap();
    h.runner
        .run(RunParams {
            scenario,
            device_id: &device_id,
            session_id: session.session_id.as_str(),
            execution_id: &ExecutionId::new("e-1"),
            report_id: &ReportId::parallel(1),
            app_package: None,
            stop,
            capture,
        })
        .await
}

fn node_events(h: &mut Harness) -> Vec<(String, NodeRunStatus)> {
    drain_events(&mut h.events)
        .into_iter()
        .filter_map(|event| match event {
            Event::TestDeviceNode {
                node_id, status, ..
            } => Some((node_id, status)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn tap_wait_end_records_three_steps() {
    let mut h = harness();
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("tap", action(ActionKind::Tap { x: 100, y: 200 })),
            node("wait", action(ActionKind::Wait { ms: 1_000 })),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "wait"), conn("wait", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(result.success, "error: {:?}", result.error);

    // Start is not recorded; tap, wait, end are
    assert_eq!(result.steps.len(), 3);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Passed));
    assert_eq!(result.steps[0].node_id, "tap");
    assert_eq!(result.steps[1].node_id, "wait");
    assert_eq!(result.steps[2].node_id, "end");

    // tap: running → passed; wait: waiting → passed; end: passed
    let events = node_events(&mut h);
    assert_eq!(
        events,
        vec![
            ("tap".to_string(), NodeRunStatus::Running),
            ("tap".to_string(), NodeRunStatus::Passed),
            ("wait".to_string(), NodeRunStatus::Waiting),
            ("wait".to_string(), NodeRunStatus::Passed),
            ("end".to_string(), NodeRunStatus::Passed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn identical_driver_replies_give_identical_steps() {
    let mut h1 = harness();
    let mut h2 = harness();
    let s = tap_scenario("s1");

    let first = run_scenario(&mut h1, &s).await;
    let second = run_scenario(&mut h2, &s).await;
    assert_eq!(first.steps, second.steps);
    assert_eq!(first.success, second.success);
}

#[tokio::test(start_paused = true)]
async fn invalid_graph_fails_without_driver_calls() {
    let mut h = harness();
    // Two start nodes
    let s = scenario(
        "s1",
        vec![
            node("a", NodeKind::Start),
            node("b", NodeKind::Start),
            node("end", NodeKind::End),
        ],
        vec![conn("a", "end"), conn("b", "end")],
    );
    let result = run_scenario(&mut h, &s).await;
    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(result.steps.is_empty());
    // The graph never executed: no touch traffic reached the driver
    assert!(!h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, dl_driver::DriverCall::Tap { .. })));
}

#[tokio::test(start_paused = true)]
async fn unbroken_cycle_is_detected() {
    let mut h = harness();
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("a", action(ActionKind::Tap { x: 1, y: 1 })),
            node("b", action(ActionKind::Tap { x: 2, y: 2 })),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "a"),
            conn("a", "b"),
            conn("b", "a"), // back-edge without a loop node
        ],
    );
    let result = run_scenario(&mut h, &s).await;
    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("cycle")));
    let last = result.steps.last().unwrap();
    assert_eq!(last.status, StepStatus::Error);
}
