// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_driver::{DriverCall, ElementRect, TemplateMatch};
use dl_scenario::{ActionParams, Selector, SelectorStrategy};

fn selector(value: &str) -> Selector {
    Selector::new(SelectorStrategy::Id, value)
}

#[tokio::test(start_paused = true)]
async fn tap_element_taps_the_center() {
    let mut h = harness();
    h.driver.show_element(
        "A",
        &selector("btn"),
        ElementRect {
            x: 100,
            y: 200,
            width: 40,
            height: 20,
        },
    );
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "tap",
                action(ActionKind::TapElement {
                    target: selector("btn"),
                }),
            ),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(result.success);
    assert!(h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { x: 120, y: 210, .. })));
}

#[tokio::test(start_paused = true)]
async fn tap_element_times_out_as_expected_failure() {
    let mut h = harness();
    let mut params = ActionParams::new(ActionKind::TapElement {
        target: selector("missing"),
    });
    params.timeout_ms = Some(3_000);
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("tap", NodeKind::Action(params)),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(!result.success);
    let step = &result.steps[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.failure_type, Some(dl_core::FailureType::Timeout));
}

#[tokio::test(start_paused = true)]
async fn transient_faults_are_retried() {
    let mut h = harness();
    h.driver.push_transient_fault("flaky adb");
    let result = run_scenario(&mut h, &tap_scenario("s1")).await;
    assert!(result.success);

    let taps = h
        .driver
        .calls()
        .iter()
        .filter(|c| matches!(c, DriverCall::Tap { .. }))
        .count();
    assert_eq!(taps, 2, "one failed attempt plus one retry");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_become_runtime_error() {
    let mut h = harness();
    for _ in 0..4 {
        h.driver.push_transient_fault("persistent fault");
    }
    let result = run_scenario(&mut h, &tap_scenario("s1")).await;
    assert!(!result.success);
    let step = &result.steps[0];
    assert_eq!(step.status, StepStatus::Error);
    assert_eq!(step.failure_type, Some(dl_core::FailureType::Runtime));
}

#[tokio::test(start_paused = true)]
async fn continue_on_error_keeps_walking() {
    let mut h = harness();
    for _ in 0..4 {
        h.driver.push_transient_fault("persistent fault");
    }
    let mut params = ActionParams::new(ActionKind::Tap { x: 1, y: 1 });
    params.continue_on_error = true;
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("tap", NodeKind::Action(params)),
            node("home", action(ActionKind::Home)),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "home"), conn("home", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(result.success, "scenario completes despite the failed tap");
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.steps[0].status, StepStatus::Error);
    assert_eq!(result.steps[1].status, StepStatus::Passed);
}

#[tokio::test(start_paused = true)]
async fn wait_until_exists_passes_when_element_is_present() {
    let mut h = harness();
    h.driver.show_element(
        "A",
        &selector("spinner-done"),
        ElementRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        },
    );
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "wait",
                action(ActionKind::WaitUntilExists {
                    target: selector("spinner-done"),
                    interval_ms: None,
                }),
            ),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "wait"), conn("wait", "end")],
    );
    let result = run_scenario(&mut h, &s).await;
    assert!(result.success);
    assert_eq!(result.steps[0].status, StepStatus::Passed);
}

#[tokio::test(start_paused = true)]
async fn wait_until_text_times_out_with_failed_status() {
    let mut h = harness();
    let mut params = ActionParams::new(ActionKind::WaitUntilTextExists {
        text: "Welcome".into(),
    });
    params.timeout_ms = Some(2_000);
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("wait", NodeKind::Action(params)),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "wait"), conn("wait", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(!result.success);
    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert_eq!(
        result.steps[0].failure_type,
        Some(dl_core::FailureType::Timeout)
    );

    // The waiting marker was emitted before the block, then a failed marker
    let events = node_events(&mut h);
    assert_eq!(
        events,
        vec![
            ("wait".to_string(), NodeRunStatus::Waiting),
            ("wait".to_string(), NodeRunStatus::Failed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn launch_app_without_package_is_fatal() {
    let mut h = harness();
    let mut params = ActionParams::new(ActionKind::LaunchApp { package: None });
    // Fatal even with continue-on-error
    params.continue_on_error = true;
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("launch", NodeKind::Action(params)),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "launch"), conn("launch", "end")],
    );
    let result = run_scenario(&mut h, &s).await;
    assert!(!result.success);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].status, StepStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn terminate_app_without_package_honors_continue_on_error() {
    let mut h = harness();
    let mut params = ActionParams::new(ActionKind::TerminateApp { package: None });
    params.continue_on_error = true;
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("terminate", NodeKind::Action(params)),
            node("home", action(ActionKind::Home)),
            node("end", NodeKind::End),
        ],
        vec![
            conn("start", "terminate"),
            conn("terminate", "home"),
            conn("home", "end"),
        ],
    );
    let result = run_scenario(&mut h, &s).await;
    // Unlike launchApp, a missing package here is an ordinary failure
    assert!(result.success);
    assert_eq!(result.steps[0].status, StepStatus::Error);
    assert_eq!(result.steps[1].status, StepStatus::Passed);
}

#[tokio::test(start_paused = true)]
async fn launch_app_uses_the_scenario_package() {
    let mut h = harness();
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("launch", action(ActionKind::LaunchApp { package: None })),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "launch"), conn("launch", "end")],
    );
    let device_id = DeviceId::new("A");
    let session = h.registry.ensure_session(&device_id).await.unwrap();
    let result = h
        .runner
        .run(RunParams {
            scenario: &s,
            device_id: &device_id,
            session_id: session.session_id.as_str(),
            execution_id: &ExecutionId::new("e-1"),
            report_id: &ReportId::parallel(1),
            app_package: Some("com.shop"),
            stop: &StopSignal::new(),
            capture: CaptureOptions::default(),
        })
        .await;
    assert!(result.success);
    assert!(h.driver.calls().iter().any(
        |c| matches!(c, DriverCall::LaunchApp { package, .. } if package == "com.shop")
    ));
}

#[tokio::test(start_paused = true)]
async fn tap_image_taps_match_and_saves_highlight() {
    let mut h = harness();
    h.matcher.place(
        "logo",
        TemplateMatch {
            x: 50,
            y: 60,
            width: 20,
            height: 20,
            score: 0.99,
        },
    );
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node(
                "tap",
                action(ActionKind::TapImage {
                    template_id: "logo".into(),
                }),
            ),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(result.success);
    assert!(h
        .driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Tap { x: 60, y: 70, .. })));
    // Highlight artifact landed under the report directory
    let highlight_dir = h.artifacts.root().join("reports/screenshots/pr-1/A");
    let entries: Vec<_> = std::fs::read_dir(&highlight_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_action_captures_a_failure_screenshot() {
    let mut h = harness();
    let mut params = ActionParams::new(ActionKind::TapElement {
        target: selector("missing"),
    });
    params.timeout_ms = Some(1_000);
    let s = scenario(
        "s1",
        vec![
            node("start", NodeKind::Start),
            node("tap", NodeKind::Action(params)),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "end")],
    );

    let result = run_scenario(&mut h, &s).await;
    assert!(!result.success);
    assert_eq!(result.screenshots.len(), 1);
    assert_eq!(result.screenshots[0].kind, ScreenshotKind::Failed);
    assert!(result.screenshots[0].path.exists());
}
