// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn begin_then_finish_computes_duration() {
    let mut step = StepResult::begin("n1", "Tap", "action", 1_000);
    assert_eq!(step.status, StepStatus::Waiting);

    step.finish(StepStatus::Passed, 1_750);
    assert_eq!(step.status, StepStatus::Passed);
    assert_eq!(step.duration_ms, 750);
    assert_eq!(step.end_ms, 1_750);
}

#[test]
fn finish_saturates_on_backdated_start() {
    let mut step = StepResult::begin("n1", "Wait", "action", 5_000);
    step.start_ms = 6_000;
    step.finish(StepStatus::Failed, 5_500);
    assert_eq!(step.duration_ms, 0);
}

#[test]
fn waiting_is_the_only_non_terminal_status() {
    assert!(!StepStatus::Waiting.is_terminal());
    for s in [
        StepStatus::Passed,
        StepStatus::Failed,
        StepStatus::Error,
        StepStatus::Skipped,
    ] {
        assert!(s.is_terminal());
    }
}

#[test]
fn step_result_json_omits_empty_error() {
    let step = StepResult::begin("n1", "Tap", "action", 0);
    let json = serde_json::to_string(&step).unwrap();
    assert!(!json.contains("\"error\""));
    assert!(!json.contains("failure_type"));
}

#[test]
fn screenshot_kind_display_matches_artifact_names() {
    assert_eq!(ScreenshotKind::Step.to_string(), "step");
    assert_eq!(ScreenshotKind::Final.to_string(), "final");
    assert_eq!(ScreenshotKind::Failed.to_string(), "failed");
    assert_eq!(ScreenshotKind::Highlight.to_string(), "highlight");
}
