// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::TestExecutor;
use crate::test_helpers::{
    action, conn, drain_events, harness, node, put_scenario, scenario, tap_scenario, Harness,
};
use dl_core::{FakeClock, ScenarioId};
use dl_driver::{FakeDriver, FakeMatcher};
use dl_scenario::{ActionKind, NodeKind};

type Orchestrator = QueueOrchestrator<FakeDriver, FakeMatcher, FakeClock>;

fn orchestrator(h: &Harness) -> Arc<Orchestrator> {
    let executor = Arc::new(TestExecutor::new(
        Arc::clone(&h.registry),
        h.runner.clone(),
        h.store.clone(),
        h.sink.clone(),
        h.clock.clone(),
    ));
    Arc::new(QueueOrchestrator::new(
        executor,
        h.store.clone(),
        h.sink.clone(),
        h.clock.clone(),
    ))
}

fn request(devices: &[&str], scenarios: &[&str]) -> TestRequest {
    TestRequest {
        device_ids: devices.iter().map(|d| DeviceId::new(*d)).collect(),
        scenario_ids: scenarios.iter().map(|s| ScenarioId::new(*s)).collect(),
        repeat_count: 1,
        scenario_interval_ms: 0,
        user_name: "alice".into(),
        priority: 0,
        test_name: None,
        split_execution: false,
    }
}

/// A scenario whose only action waits long enough to hold its devices busy
/// until the test stops it or virtual time is allowed to run.
fn slow_scenario(id: &str) -> dl_scenario::Scenario {
    scenario(
        id,
        vec![
            node("start", NodeKind::Start),
            node("wait", action(ActionKind::Wait { ms: 30_000 })),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "wait"), conn("wait", "end")],
    )
}

/// Sleep-poll until the orchestrator has no items left. Sleeping (rather
/// than spinning) lets paused-time tests auto-advance the workers' timers.
async fn drain(orchestrator: &Arc<Orchestrator>) {
    loop {
        let (entries, _) = orchestrator.queue_status(None);
        if entries.is_empty() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

fn client(id: &str) -> ClientId {
    ClientId::new(id)
}

#[tokio::test(start_paused = true)]
async fn idle_devices_run_immediately() {
    let mut h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    let outcome = q.submit_test(request(&["A", "B"], &["s1"]), client("c1")).unwrap();
    assert_ne!(outcome.state, QueueState::Queued);

    drain(&q).await;
    let events = drain_events(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::QueueAssigned { queue_id, .. } if queue_id == &outcome.queue_id
    )));
    assert!(!q.is_device_busy(&DeviceId::new("A")));
}

#[tokio::test(start_paused = true)]
async fn empty_submissions_are_rejected() {
    let h = harness();
    let q = orchestrator(&h);
    assert!(matches!(
        q.submit_test(request(&[], &["s1"]), client("c1")),
        Err(EngineError::InvalidRequest(_))
    ));
    assert!(matches!(
        q.submit_test(request(&["A"], &[]), client("c1")),
        Err(EngineError::InvalidRequest(_))
    ));
    // Malformed device ids never enter the queue
    assert!(matches!(
        q.submit_test(request(&["bad id!"], &["s1"]), client("c1")),
        Err(EngineError::InvalidRequest(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn full_device_set_waits_for_busy_member() {
    let mut h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    // First submission occupies A
    let first = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();
    assert!(q.is_device_busy(&DeviceId::new("A")));

    // Second wants A+B: B stays idle, the item stays queued
    let second = q
        .submit_test(request(&["A", "B"], &["s1"]), client("c2"))
        .unwrap();
    assert_eq!(second.state, QueueState::Queued);
    assert_eq!(second.position, 1);
    assert!(!q.is_device_busy(&DeviceId::new("B")));

    drain(&q).await;
    // Assignment order: first on [A], then second on [A, B] together
    let assigned: Vec<(QueueId, Vec<DeviceId>)> = drain_events(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            Event::QueueAssigned {
                queue_id,
                device_ids,
                ..
            } => Some((queue_id, device_ids)),
            _ => None,
        })
        .collect();
    assert_eq!(assigned.len(), 2);
    assert_eq!(assigned[0].0, first.queue_id);
    assert_eq!(assigned[1].0, second.queue_id);
    assert_eq!(
        assigned[1].1,
        vec![DeviceId::new("A"), DeviceId::new("B")]
    );
}

#[tokio::test(start_paused = true)]
async fn split_runs_idle_subset_and_requeues_remainder() {
    let mut h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    let _first = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();

    let mut req = request(&["A", "B"], &["s1"]);
    req.split_execution = true;
    let second = q.submit_test(req, client("c2")).unwrap();
    assert_eq!(second.state, QueueState::Split);

    // The clone for A is waiting in A's queue
    let (entries, device_statuses) = q.queue_status(None);
    let clone = entries
        .iter()
        .find(|e| e.state == QueueState::Queued && e.device_ids == vec![DeviceId::new("A")])
        .expect("remainder clone should be queued on A");
    assert_ne!(clone.queue_id, second.queue_id);
    assert!(device_statuses
        .iter()
        .any(|d| d.device_id == DeviceId::new("B") && d.busy));

    drain(&q).await;

    // Both halves merged into one consolidated report under the parent id
    let merged: TestReport = h
        .store
        .get(
            collections::TEST_REPORTS,
            &format!("tr-split-{}", second.queue_id),
        )
        .unwrap();
    let mut covered: Vec<&str> = merged.device_ids.iter().map(|d| d.as_str()).collect();
    covered.sort_unstable();
    assert_eq!(covered, vec!["A", "B"]);
    assert_eq!(merged.execution_id.as_str(), second.queue_id.as_str());
    drain_events(&mut h.events);
}

#[tokio::test(start_paused = true)]
async fn priority_orders_one_device_queue() {
    let mut h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    let _running = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();
    let low = q.submit_test(request(&["A"], &["s1"]), client("c2")).unwrap();
    let mut high_req = request(&["A"], &["s1"]);
    high_req.priority = 2;
    high_req.user_name = "bob".into();
    let high = q.submit_test(high_req, client("c3")).unwrap();

    // Higher priority overtakes, ties keep submission order
    assert_eq!(high.position, 1);
    assert_eq!(
        q.queue_status(Some("alice"))
            .0
            .iter()
            .find(|e| e.queue_id == low.queue_id)
            .unwrap()
            .position,
        2
    );

    drain(&q).await;
    let assigned: Vec<QueueId> = drain_events(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            Event::QueueAssigned { queue_id, .. } => Some(queue_id),
            _ => None,
        })
        .collect();
    let high_at = assigned.iter().position(|id| id == &high.queue_id).unwrap();
    let low_at = assigned.iter().position(|id| id == &low.queue_id).unwrap();
    assert!(high_at < low_at);
}

#[tokio::test(start_paused = true)]
async fn owner_can_cancel_a_queued_item() {
    let mut h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    let _running = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();
    let queued = q.submit_test(request(&["A"], &["s1"]), client("c2")).unwrap();

    let (ok, _) = q.cancel_test(&queued.queue_id, &client("c2")).unwrap();
    assert!(ok);

    drain(&q).await;
    // Cancelled before running: it never got assigned
    let events = drain_events(&mut h.events);
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::QueueAssigned { queue_id, .. } if queue_id == &queued.queue_id
    )));
}

#[tokio::test(start_paused = true)]
async fn only_the_owner_may_cancel() {
    let h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    let _running = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();
    let queued = q.submit_test(request(&["A"], &["s1"]), client("c2")).unwrap();

    let err = q.cancel_test(&queued.queue_id, &client("intruder")).unwrap_err();
    assert!(matches!(err, EngineError::OwnerMismatch(_)));
    drain(&q).await;
}

#[tokio::test(start_paused = true)]
async fn cancelling_unknown_item_is_a_diagnostic_no_op() {
    let h = harness();
    let q = orchestrator(&h);
    let (ok, message) = q
        .cancel_test(&QueueId::new("q-999"), &client("c1"))
        .unwrap();
    assert!(!ok);
    assert!(message.contains("not found"));
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_queued_items_only() {
    let h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    put_scenario(&h.store, &tap_scenario("s1"));
    let q = orchestrator(&h);

    let running = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();
    let queued = q.submit_test(request(&["A"], &["s1"]), client("c1")).unwrap();

    q.handle_socket_disconnect(&client("c1"));

    let (entries, _) = q.queue_status(None);
    assert!(entries.iter().all(|e| e.queue_id != queued.queue_id));
    assert!(entries.iter().any(|e| e.queue_id == running.queue_id));
    drain(&q).await;
}

#[tokio::test(start_paused = true)]
async fn wait_estimates_appear_once_history_exists() {
    let mut h = harness();
    put_scenario(&h.store, &tap_scenario("s1"));
    put_scenario(&h.store, &slow_scenario("slow"));
    let q = orchestrator(&h);

    // No history yet
    let first = q.submit_test(request(&["A"], &["s1"]), client("c1")).unwrap();
    assert!(first.estimated_wait_ms.is_none());
    drain(&q).await;

    // With one completed run behind us, queued items get an estimate
    let _running = q.submit_test(request(&["A"], &["slow"]), client("c1")).unwrap();
    let queued = q.submit_test(request(&["A"], &["s1"]), client("c1")).unwrap();
    assert_eq!(queued.state, QueueState::Queued);
    assert!(queued.estimated_wait_ms.is_some());
    drain(&q).await;
    drain_events(&mut h.events);
}

#[tokio::test(start_paused = true)]
async fn overlapping_device_sets_never_run_together() {
    let mut h = harness();
    put_scenario(&h.store, &slow_scenario("slow"));
    let q = orchestrator(&h);

    let first = q
        .submit_test(request(&["A", "B"], &["slow"]), client("c1"))
        .unwrap();
    let second = q
        .submit_test(request(&["B", "C"], &["slow"]), client("c2"))
        .unwrap();
    // B is shared: the second submission must wait
    assert_ne!(first.state, QueueState::Queued);
    assert_eq!(second.state, QueueState::Queued);
    assert!(q.is_device_busy(&DeviceId::new("B")));
    assert!(!q.is_device_busy(&DeviceId::new("C")));

    drain(&q).await;
    drain_events(&mut h.events);
}
