// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end specs driving the whole system through `dl_daemon::System`
//! with fake automation adapters.

use std::sync::Arc;
use std::time::Duration;

use dl_core::{
    ClientId, Clock, DeviceId, Event, FakeClock, QueueState, ScenarioId, TestReport, TestRequest,
    TestRunStatus,
};
use dl_daemon::{Config, System};
use dl_driver::{FakeDriver, FakeMatcher};
use dl_engine::{CronExpr, ParallelOptions};
use dl_scenario::{
    ActionKind, ActionParams, Connection, Node, NodeId, NodeKind, Scenario,
};
use dl_storage::{collections, DocumentStore};

type TestSystem = System<FakeDriver, FakeMatcher, FakeClock>;

struct World {
    driver: FakeDriver,
    clock: FakeClock,
    system: Arc<TestSystem>,
    store: DocumentStore,
    _tmp: tempfile::TempDir,
}

fn world() -> World {
    let tmp = tempfile::tempdir().unwrap();
    let driver = FakeDriver::new();
    let clock = FakeClock::new();
    let system = Arc::new(System::new(
        driver.clone(),
        FakeMatcher::new(),
        clock.clone(),
        tmp.path(),
        &Config::default(),
    ));
    let store = DocumentStore::new(tmp.path());
    World {
        driver,
        clock,
        system,
        store,
        _tmp: tmp,
    }
}

fn node(id: &str, kind: NodeKind) -> Node {
    Node {
        id: NodeId::new(id),
        label: None,
        kind,
    }
}

fn conn(from: &str, to: &str) -> Connection {
    Connection {
        from: NodeId::new(from),
        to: NodeId::new(to),
        branch: None,
    }
}

/// `start → tap → wait → end`
fn tap_wait_scenario(id: &str, wait_ms: u64) -> Scenario {
    Scenario {
        id: ScenarioId::new(id),
        name: format!("scenario {id}"),
        package_id: None,
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "tap",
                NodeKind::Action(ActionParams::new(ActionKind::Tap { x: 100, y: 200 })),
            ),
            node(
                "wait",
                NodeKind::Action(ActionParams::new(ActionKind::Wait { ms: wait_ms })),
            ),
            node("end", NodeKind::End),
        ],
        connections: vec![conn("start", "tap"), conn("tap", "wait"), conn("wait", "end")],
    }
}

fn put_scenario(world: &World, scenario: &Scenario) {
    world
        .store
        .put(collections::SCENARIOS, scenario.id.as_str(), scenario)
        .unwrap();
}

fn request(devices: &[&str], scenarios: &[&str], user: &str) -> TestRequest {
    TestRequest {
        device_ids: devices.iter().map(|d| DeviceId::new(*d)).collect(),
        scenario_ids: scenarios.iter().map(|s| ScenarioId::new(*s)).collect(),
        repeat_count: 1,
        scenario_interval_ms: 0,
        user_name: user.to_string(),
        priority: 0,
        test_name: None,
        split_execution: false,
    }
}

async fn drain_queue(system: &TestSystem, user: &str) {
    loop {
        let (entries, _) = system.queue_status(Some(user));
        if entries.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// Two idle devices, one scenario, two repeats: four device-scenario runs
// under one execution, final status completed.
#[tokio::test(start_paused = true)]
async fn repeat_run_across_two_idle_devices() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("s1", 1_000));
    let client = ClientId::new("sock-u");
    let mut rx = w.system.subscribe(client.clone());

    let mut req = request(&["A", "B"], &["s1"], "u");
    req.repeat_count = 2;
    let outcome = w.system.submit_test(req, client).unwrap();
    assert_ne!(outcome.state, QueueState::Queued);

    drain_queue(&w.system, "u").await;

    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        if let Event::TestComplete {
            execution_id,
            status,
            report_id,
        } = event
        {
            assert_eq!(execution_id.as_str(), outcome.queue_id.as_str());
            completed = Some((status, report_id));
        }
    }
    let (status, report_id) = completed.expect("test:complete was emitted");
    assert_eq!(status, TestRunStatus::Completed);

    let report: TestReport = w
        .store
        .get(collections::TEST_REPORTS, report_id.unwrap().as_str())
        .unwrap();
    let total_runs: usize = report
        .summaries
        .iter()
        .map(|s| s.device_results.len())
        .sum();
    assert_eq!(total_runs, 4, "2 devices × 2 repeats");
    assert_eq!(report.stats.passed, 4);
}

// A busy, B idle, no split: the submission stays queued at position 1 and
// both devices go busy together on A's release.
#[tokio::test(start_paused = true)]
async fn full_set_admission_waits_for_all_devices() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("hold", 30_000));
    put_scenario(&w, &tap_wait_scenario("s1", 500));
    let c1 = ClientId::new("sock-1");
    let c2 = ClientId::new("sock-2");
    let mut rx = w.system.subscribe(c2.clone());

    let first = w
        .system
        .submit_test(request(&["A"], &["hold"], "u1"), c1)
        .unwrap();
    assert_ne!(first.state, QueueState::Queued);

    let second = w
        .system
        .submit_test(request(&["A", "B"], &["s1"], "u2"), c2)
        .unwrap();
    assert_eq!(second.state, QueueState::Queued);
    assert_eq!(second.position, 1);

    drain_queue(&w.system, "u2").await;

    // When assigned, the whole requested set was taken at once
    let mut assigned_devices = None;
    while let Ok(event) = rx.try_recv() {
        if let Event::QueueAssigned {
            queue_id,
            device_ids,
            ..
        } = event
        {
            if queue_id == second.queue_id {
                assigned_devices = Some(device_ids);
            }
        }
    }
    assert_eq!(
        assigned_devices.unwrap(),
        vec![DeviceId::new("A"), DeviceId::new("B")]
    );
}

// Split execution runs the idle subset immediately and merges both halves
// into one consolidated report under the parent queue id.
#[tokio::test(start_paused = true)]
async fn split_execution_merges_into_one_report() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("hold", 30_000));
    put_scenario(&w, &tap_wait_scenario("s1", 500));
    let c1 = ClientId::new("sock-1");
    let c2 = ClientId::new("sock-2");

    w.system
        .submit_test(request(&["A"], &["hold"], "u1"), c1)
        .unwrap();

    let mut req = request(&["A", "B"], &["s1"], "u2");
    req.split_execution = true;
    let split = w.system.submit_test(req, c2).unwrap();
    assert_eq!(split.state, QueueState::Split);

    drain_queue(&w.system, "u2").await;

    let merged: TestReport = w
        .store
        .get(
            collections::TEST_REPORTS,
            &format!("tr-split-{}", split.queue_id),
        )
        .unwrap();
    let mut devices: Vec<&str> = merged.device_ids.iter().map(|d| d.as_str()).collect();
    devices.sort_unstable();
    assert_eq!(devices, vec!["A", "B"]);
    assert_eq!(merged.status, TestRunStatus::Completed);
}

// Tap then wait then end: node events arrive in order with the waiting
// marker, and exactly three steps are recorded (start excluded).
#[tokio::test(start_paused = true)]
async fn step_stream_for_tap_wait_end() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("s1", 1_000));
    let client = ClientId::new("sock-1");
    let mut rx = w.system.subscribe(client.clone());

    w.system
        .submit_test(request(&["A"], &["s1"], "u"), client)
        .unwrap();
    drain_queue(&w.system, "u").await;

    let mut node_events = Vec::new();
    let mut report_id = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::TestDeviceNode {
                node_id, status, ..
            } => node_events.push((node_id, status)),
            Event::TestComplete { report_id: id, .. } => report_id = id,
            _ => {}
        }
    }

    use dl_core::NodeRunStatus::*;
    assert_eq!(
        node_events,
        vec![
            ("tap".to_string(), Running),
            ("tap".to_string(), Passed),
            ("wait".to_string(), Waiting),
            ("wait".to_string(), Passed),
            ("end".to_string(), Passed),
        ]
    );

    let report: TestReport = w
        .store
        .get(collections::TEST_REPORTS, report_id.unwrap().as_str())
        .unwrap();
    let steps = &report.summaries[0].device_results[0].steps;
    assert_eq!(steps.len(), 3);
}

// One dead session gets recreated, one device fails validation: the
// parallel run proceeds on the survivors and reports the failure.
#[tokio::test(start_paused = true)]
async fn parallel_run_with_recreated_and_failed_sessions() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("s1", 500));
    let client = ClientId::new("sock-1");
    let mut rx = w.system.subscribe(client);

    // B has a dead session, C cannot attach at all
    let b = w.system.create_session(&DeviceId::new("B")).await.unwrap();
    w.driver.kill_session(b.session_id.as_str());
    w.driver.reject_device("C");

    let report = w
        .system
        .execute_parallel(
            &ScenarioId::new("s1"),
            &[DeviceId::new("A"), DeviceId::new("B"), DeviceId::new("C")],
            ParallelOptions::default(),
        )
        .await
        .unwrap();

    let mut devices: Vec<&str> = report
        .device_results
        .iter()
        .map(|r| r.device_id.as_str())
        .collect();
    devices.sort_unstable();
    assert_eq!(devices, vec!["A", "B"]);

    let mut failed_devices = None;
    let mut recreated_devices = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::TestSessionFailed { device_ids, .. } => failed_devices = Some(device_ids),
            Event::TestSessionRecreated { device_ids, .. } => recreated_devices = Some(device_ids),
            _ => {}
        }
    }
    assert_eq!(failed_devices.unwrap(), vec![DeviceId::new("C")]);
    assert_eq!(recreated_devices.unwrap(), vec![DeviceId::new("B")]);
}

// A half-hourly schedule fired twice writes two history entries,
// last_run_at reflects the newest fire, and next_run_at is strictly ahead.
#[tokio::test]
async fn half_hourly_schedule_history_and_next_run() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("s1", 0));
    w.system.create_session(&DeviceId::new("A")).await.unwrap();

    let schedule = dl_core::Schedule {
        id: dl_core::ScheduleId::new("sch-1"),
        name: "half-hourly".into(),
        scenario_id: ScenarioId::new("s1"),
        device_ids: vec![DeviceId::new("A")],
        cron_expression: "*/30 * * * *".into(),
        enabled: false,
        last_run_at_ms: None,
        next_run_at_ms: None,
    };
    let created = w.system.create_schedule(schedule).unwrap();
    assert!(created.next_run_at_ms.is_some());

    // Fire at :00 and :30
    let cron = CronExpr::parse("*/30 * * * *").unwrap();
    let first_fire = cron.next_after_ms(w.clock.epoch_ms()).unwrap();
    w.clock
        .advance(Duration::from_millis(first_fire - w.clock.epoch_ms()));
    w.system.schedules().fire(&dl_core::ScheduleId::new("sch-1")).await;

    w.clock.advance(Duration::from_secs(1_800));
    let second_fire = w.clock.epoch_ms();
    w.system.schedules().fire(&dl_core::ScheduleId::new("sch-1")).await;

    let history = w.system.schedule_history().unwrap();
    assert_eq!(history.len(), 2);

    let stored: dl_core::Schedule = w.store.get(collections::SCHEDULES, "sch-1").unwrap();
    assert_eq!(stored.last_run_at_ms, Some(second_fire));
    assert!(stored.next_run_at_ms.unwrap() > w.clock.epoch_ms());
}

// Cancellation causality: a successfully cancelled queued item never runs.
#[tokio::test(start_paused = true)]
async fn cancelled_queued_item_never_enters_running() {
    let w = world();
    put_scenario(&w, &tap_wait_scenario("hold", 30_000));
    put_scenario(&w, &tap_wait_scenario("s1", 100));
    let c1 = ClientId::new("sock-1");
    let c2 = ClientId::new("sock-2");
    let mut rx = w.system.subscribe(c2.clone());

    w.system
        .submit_test(request(&["A"], &["hold"], "u1"), c1)
        .unwrap();
    let queued = w
        .system
        .submit_test(request(&["A"], &["s1"], "u2"), c2.clone())
        .unwrap();
    assert_eq!(queued.state, QueueState::Queued);

    let (ok, _) = w.system.cancel_test(&queued.queue_id, &c2).unwrap();
    assert!(ok);

    drain_queue(&w.system, "u1").await;
    drain_queue(&w.system, "u2").await;

    while let Ok(event) = rx.try_recv() {
        if let Event::QueueAssigned { queue_id, .. } = event {
            assert_ne!(queue_id, queued.queue_id, "cancelled item was assigned");
        }
    }
}
