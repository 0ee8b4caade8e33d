// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::StepStatus;
use dl_driver::{DriverCall, ElementRect};
use dl_scenario::{Branch, ConditionKind, LoopKind, LoopParams, Selector, SelectorStrategy};

fn selector(value: &str) -> Selector {
    Selector::new(SelectorStrategy::Id, value)
}

/// start → cond(textExists "Cart") → yes: tap-yes / no: tap-no → end
fn branching_scenario() -> Scenario {
    scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "cond",
                condition(ConditionKind::TextExists {
                    text: "Cart".into(),
                }),
            ),
            node("tap-yes", action(ActionKind::Tap { x: 1, y: 1 })),
            node("tap-no", action(ActionKind::Tap { x: 2, y: 2 })),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "cond"),
            branch_conn("cond", "tap-yes", Branch::Yes),
            branch_conn("cond", "tap-no", Branch::No),
            conn("tap-yes", "end"),
            conn("tap-no", "end"),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn condition_true_takes_the_yes_branch() {
    let mut h = harness();
    h.driver.show_text("A", "Cart");
    let result = run_scenario(&mut h, &branching_scenario()).await;
    assert!(result.success);
    assert!(h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { x: 1, y: 1, .. })));
}

#[tokio::test(start_paused = true)]
async fn condition_false_takes_the_no_branch() {
    let mut h = harness();
    let result = run_scenario(&mut h, &branching_scenario()).await;
    assert!(result.success);
    assert!(h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { x: 2, y: 2, .. })));
}

#[tokio::test(start_paused = true)]
async fn throwing_condition_is_recorded_and_treated_as_no() {
    let mut h = harness();
    // Xpath lookups are rejected by the driver: the condition throws
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "cond",
                condition(ConditionKind::ElementExists {
                    target: Selector::new(SelectorStrategy::Xpath, "//button"),
                }),
            ),
            node("tap-yes", action(ActionKind::Tap { x: 1, y: 1 })),
            node("tap-no", action(ActionKind::Tap { x: 2, y: 2 })),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "cond"),
            branch_conn("cond", "tap-yes", Branch::Yes),
            branch_conn("cond", "tap-no", Branch::No),
            conn("tap-yes", "end"),
            conn("tap-no", "end"),
        ],
    );
    let result = run_scenario(&mut h, &s).await;
    assert!(result.success);

    let cond_step = result.steps.iter().find(|s| s.node_id == "cond").unwrap();
    assert_eq!(cond_step.status, StepStatus::Error);
    assert!(cond_step.error.is_some());
    // The walk continued down the "no" branch
    assert!(h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { x: 2, y: 2, .. })));
}

/// start → loop(count n) → loop: tap → back to loop / exit: end
fn counted_loop_scenario(count: u32) -> Scenario {
    scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("loop", count_loop(count)),
            node("tap", action(ActionKind::Tap { x: 9, y: 9 })),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "loop"),
            branch_conn("loop", "tap", Branch::Loop),
            conn("tap", "loop"),
            branch_conn("loop", "end", Branch::Exit),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn count_loop_runs_the_body_n_times() {
    let mut h = harness();
    let result = run_scenario(&mut h, &counted_loop_scenario(3)).await;
    assert!(result.success, "error: {:?}", result.error);

    let taps = h
        .driver
        .calls()
        .iter()
        .filter(|c| matches!(c, DriverCall::Tap { .. }))
        .count();
    assert_eq!(taps, 3);

    // Loop evaluations: 3 continue + 1 exit, plus 3 body taps, plus end
    let loop_steps = result.steps.iter().filter(|s| s.node_id == "loop").count();
    assert_eq!(loop_steps, 4);
}

#[tokio::test(start_paused = true)]
async fn zero_count_loop_exits_immediately() {
    let mut h = harness();
    let result = run_scenario(&mut h, &counted_loop_scenario(0)).await;
    assert!(result.success);
    assert!(!h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { .. })));
}

#[tokio::test(start_paused = true)]
async fn while_exists_exits_when_nothing_matches() {
    let mut h = harness();
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "loop",
                NodeKind::Loop(LoopParams {
                    kind: LoopKind::WhileExists {
                        target: selector("row"),
                    },
                }),
            ),
            node("tap", action(ActionKind::Tap { x: 9, y: 9 })),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "loop"),
            branch_conn("loop", "tap", Branch::Loop),
            conn("tap", "loop"),
            branch_conn("loop", "end", Branch::Exit),
        ],
    );
    let result = run_scenario(&mut h, &s).await;
    assert!(result.success);
    assert!(!h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { .. })));
}

#[tokio::test(start_paused = true)]
async fn while_not_exists_loops_until_element_appears() {
    let mut h = harness();
    h.driver.show_element(
        "A",
        &selector("done"),
        ElementRect {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        },
    );
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "loop",
                NodeKind::Loop(LoopParams {
                    kind: LoopKind::WhileNotExists {
                        target: selector("done"),
                    },
                }),
            ),
            node("tap", action(ActionKind::Tap { x: 9, y: 9 })),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "loop"),
            branch_conn("loop", "tap", Branch::Loop),
            conn("tap", "loop"),
            branch_conn("loop", "end", Branch::Exit),
        ],
    );
    // Element already present: zero iterations
    let result = run_scenario(&mut h, &s).await;
    assert!(result.success);
    assert!(!h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { .. })));
}
