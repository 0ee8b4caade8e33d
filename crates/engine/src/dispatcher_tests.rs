// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{drain_events, harness, put_scenario, tap_scenario, Harness};
use std::sync::atomic::Ordering;

type TestDispatcher =
    ParallelDispatcher<dl_driver::FakeDriver, dl_driver::FakeMatcher, dl_core::FakeClock>;

fn dispatcher(h: &Harness) -> Arc<TestDispatcher> {
    Arc::new(ParallelDispatcher::new(
        Arc::clone(&h.registry),
        h.runner.clone(),
        h.store.clone(),
        h.artifacts.clone(),
        h.sink.clone(),
        h.clock.clone(),
    ))
}

#[tokio::test(start_paused = true)]
async fn parallel_run_covers_every_valid_device() {
    let mut h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    let d = dispatcher(&h);
    let devices = vec![DeviceId::new("A"), DeviceId::new("B")];

    let report = d
        .execute_parallel(&ScenarioId::new("s1"), &devices, ParallelOptions::default())
        .await
        .unwrap();

    assert_eq!(report.device_results.len(), 2);
    assert!(report.device_results.iter().all(|r| r.success));
    assert_eq!(report.stats.passed, 2);
    assert_eq!(report.stats.failed, 0);

    // Report document was persisted under its pre-allocated id
    let stored: ParallelReport = h
        .store
        .get(collections::PARALLEL_REPORTS, report.report_id.as_str())
        .unwrap();
    assert_eq!(stored.report_id, report.report_id);

    let kinds: Vec<&'static str> = drain_events(&mut h.events)
        .iter()
        .map(|e| e.kind())
        .collect();
    assert!(kinds.contains(&"parallel:start"));
    assert!(kinds.contains(&"parallel:complete"));
}

#[tokio::test(start_paused = true)]
async fn missing_scenario_fails_the_call() {
    let h = harness();
    let d = dispatcher(&h);
    let err = d
        .execute_parallel(
            &ScenarioId::new("ghost"),
            &[DeviceId::new("A")],
            ParallelOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScenarioNotFound(_)));
    assert!(!d.is_running());
}

#[tokio::test(start_paused = true)]
async fn failed_sessions_are_dropped_not_fatal() {
    let mut h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    // C's session cannot be established; B's existing session is dead
    h.driver.reject_device("C");
    let b_info = h.registry.create(&DeviceId::new("B")).await.unwrap();
    h.driver.kill_session(b_info.session_id.as_str());

    let d = dispatcher(&h);
    let devices = vec![DeviceId::new("A"), DeviceId::new("B"), DeviceId::new("C")];
    let report = d
        .execute_parallel(&ScenarioId::new("s1"), &devices, ParallelOptions::default())
        .await
        .unwrap();

    // Only A and B ran
    let mut ran: Vec<&str> = report
        .device_results
        .iter()
        .map(|r| r.device_id.as_str())
        .collect();
    ran.sort_unstable();
    assert_eq!(ran, vec!["A", "B"]);

    let events = drain_events(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::TestSessionFailed { device_ids, .. } if device_ids == &[DeviceId::new("C")]
    )));
}

#[tokio::test(start_paused = true)]
async fn all_sessions_failing_fails_the_whole_call() {
    let h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    h.driver.reject_device("A");
    let d = dispatcher(&h);

    let err = d
        .execute_parallel(
            &ScenarioId::new("s1"),
            &[DeviceId::new("A")],
            ParallelOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoValidDevices(_)));
}

#[tokio::test(start_paused = true)]
async fn busy_dispatcher_rejects_a_second_run() {
    let h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    let d = dispatcher(&h);

    // Simulate an in-flight run holding the guard
    d.running.store(true, Ordering::SeqCst);
    let err = d
        .execute_parallel(
            &ScenarioId::new("s1"),
            &[DeviceId::new("A")],
            ParallelOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DispatcherBusy));

    d.running.store(false, Ordering::SeqCst);
    assert!(d
        .execute_parallel(
            &ScenarioId::new("s1"),
            &[DeviceId::new("A")],
            ParallelOptions::default(),
        )
        .await
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn recorded_video_is_persisted_per_device() {
    let h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    let d = dispatcher(&h);
    let options = ParallelOptions {
        record_video: true,
        ..ParallelOptions::default()
    };

    let report = d
        .execute_parallel(&ScenarioId::new("s1"), &[DeviceId::new("A")], options)
        .await
        .unwrap();

    let video = report.device_results[0].video.as_ref().unwrap();
    assert!(video.exists());
    assert!(video.ends_with(format!(
        "reports/videos/{}/A.mp4",
        report.report_id.as_str()
    )));
}

#[tokio::test(start_paused = true)]
async fn stop_device_outside_a_run_is_a_no_op() {
    let h = harness();
    let d = dispatcher(&h);
    assert!(!d.stop_device(&DeviceId::new("A")));
    d.stop_all();
}
