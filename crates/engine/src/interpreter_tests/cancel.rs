// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::StepStatus;

#[tokio::test(start_paused = true)]
async fn pre_stopped_run_skips_the_first_node() {
    let mut h = harness();
    let stop = StopSignal::new();
    stop.stop();

    let result = run_with(&mut h, &tap_scenario("s1"), &stop, CaptureOptions::default()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("stopped"));
    // The tap node was recorded as skipped, then the run returned
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].node_id, "tap");
    assert_eq!(result.steps[0].status, StepStatus::Skipped);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_wait_returns_partial_results() {
    let mut h = harness();
    let stop = StopSignal::new();
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("tap", action(ActionKind::Tap { x: 1, y: 1 })),
            node("wait", action(ActionKind::Wait { ms: 600_000 })),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "wait"), conn("wait", "end")],
    );

    let stopper = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(2_000)).await;
        stopper.stop();
    });

    let result = run_with(&mut h, &s, &stop, CaptureOptions::default()).await;
    assert!(!result.success);
    // tap passed, the wait unblocked on stop, then the end was skipped
    assert_eq!(result.steps[0].status, StepStatus::Passed);
    let end_step = result.steps.iter().find(|s| s.node_id == "end").unwrap();
    assert_eq!(end_step.status, StepStatus::Skipped);
}
