// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn item(state: QueueState) -> QueueItem {
    QueueItem {
        queue_id: QueueId::new("q-1"),
        user_name: "alice".into(),
        socket_id: ClientId::new("sock-1"),
        device_ids: vec![DeviceId::new("A")],
        scenario_ids: vec![ScenarioId::new("s1")],
        repeat_count: 1,
        scenario_interval_ms: 0,
        priority: 0,
        test_name: None,
        submitted_at_ms: 0,
        state,
        split_execution: false,
        split_parent: None,
    }
}

#[yare::parameterized(
    queued_running     = { QueueState::Queued, QueueState::Running, true },
    queued_split       = { QueueState::Queued, QueueState::Split, true },
    queued_cancelled   = { QueueState::Queued, QueueState::Cancelled, true },
    running_completed  = { QueueState::Running, QueueState::Completed, true },
    running_failed     = { QueueState::Running, QueueState::Failed, true },
    running_cancelled  = { QueueState::Running, QueueState::Cancelled, true },
    split_completed    = { QueueState::Split, QueueState::Completed, true },
    backward           = { QueueState::Running, QueueState::Queued, false },
    terminal_restart   = { QueueState::Completed, QueueState::Running, false },
    cancelled_running  = { QueueState::Cancelled, QueueState::Running, false },
    queued_completed   = { QueueState::Queued, QueueState::Completed, false },
)]
fn transitions_only_move_forward(from: QueueState, to: QueueState, ok: bool) {
    let mut it = item(from);
    assert_eq!(it.transition(to), ok);
    if ok {
        assert_eq!(it.state, to);
    } else {
        assert_eq!(it.state, from);
    }
}

#[test]
fn terminal_states() {
    assert!(QueueState::Completed.is_terminal());
    assert!(QueueState::Failed.is_terminal());
    assert!(QueueState::Cancelled.is_terminal());
    assert!(!QueueState::Queued.is_terminal());
    assert!(!QueueState::Running.is_terminal());
    assert!(!QueueState::Split.is_terminal());
}

#[test]
fn request_defaults_from_json() {
    let req: TestRequest = serde_json::from_str(
        r#"{"device_ids":["A"],"scenario_ids":["s1"],"user_name":"bob"}"#,
    )
    .unwrap();
    assert_eq!(req.repeat_count, 1);
    assert_eq!(req.scenario_interval_ms, 0);
    assert_eq!(req.priority, 0);
    assert!(!req.split_execution);
}
