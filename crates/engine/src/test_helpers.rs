// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use std::sync::Arc;

use tokio::sync::broadcast;

use dl_core::{Event, FakeClock, ScenarioId};
use dl_driver::{FakeDriver, FakeMatcher};
use dl_scenario::{
    ActionKind, ActionParams, Branch, ConditionKind, ConditionParams, Connection, LoopKind,
    LoopParams, Node, NodeId, NodeKind, Scenario,
};
use dl_storage::{collections, ArtifactStore, DocumentStore};

use crate::events::EventSink;
use crate::interpreter::ScenarioRunner;
use crate::registry::SessionRegistry;

pub(crate) type TestRunner = ScenarioRunner<FakeDriver, FakeMatcher, FakeClock>;
pub(crate) type TestRegistry = SessionRegistry<FakeDriver, FakeClock>;

/// Everything an engine test needs, wired against fakes.
pub(crate) struct Harness {
    pub driver: FakeDriver,
    pub matcher: FakeMatcher,
    pub clock: FakeClock,
    pub store: DocumentStore,
    pub artifacts: ArtifactStore,
    pub registry: Arc<TestRegistry>,
    pub runner: TestRunner,
    pub sink: EventSink,
    pub events: broadcast::Receiver<Event>,
    _tmp: tempfile::TempDir,
}

pub(crate) fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let driver = FakeDriver::new();
    let matcher = FakeMatcher::new();
    let clock = FakeClock::new();
    let store = DocumentStore::new(tmp.path());
    let artifacts = ArtifactStore::new(tmp.path());
    let (sink, events) = EventSink::channel(1024);
    let registry = Arc::new(SessionRegistry::new(driver.clone(), clock.clone()));
    let runner = ScenarioRunner::new(
        driver.clone(),
        matcher.clone(),
        clock.clone(),
        artifacts.clone(),
        sink.clone(),
    );
    Harness {
        driver,
        matcher,
        clock,
        store,
        artifacts,
        registry,
        runner,
        sink,
        events,
        _tmp: tmp,
    }
}

/// Drain everything currently buffered on the event channel.
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub(crate) fn node(id: &str, kind: NodeKind) -> Node {
    Node {
        id: NodeId::new(id),
        label: None,
        kind,
    }
}

pub(crate) fn conn(from: &str, to: &str) -> Connection {
    Connection {
        from: NodeId::new(from),
        to: NodeId::new(to),
        branch: None,
    }
}

pub(crate) fn branch_conn(from: &str, to: &str, branch: Branch) -> Connection {
    Connection {
        from: NodeId::new(from),
        to: NodeId::new(to),
        branch: Some(branch),
    }
}

pub(crate) fn action(kind: ActionKind) -> NodeKind {
    NodeKind::Action(ActionParams::new(kind))
}

pub(crate) fn condition(kind: ConditionKind) -> NodeKind {
    NodeKind::Condition(ConditionParams {
        kind,
        timeout_ms: None,
    })
}

pub(crate) fn count_loop(count: u32) -> NodeKind {
    NodeKind::Loop(LoopParams {
        kind: LoopKind::Count { count },
    })
}

pub(crate) fn scenario(id: &str, nodes: Vec<Node>, connections: Vec<Connection>) -> Scenario {
    Scenario {
        id: ScenarioId::new(id),
        name: format!("scenario {id}"),
        package_id: None,
        nodes,
        connections,
    }
}

/// `start → tap → end`, the minimal passing scenario.
pub(crate) fn tap_scenario(id: &str) -> Scenario {
    scenario(
        id,
        vec![
            node("start", NodeKind::Start),
            node("tap", action(ActionKind::Tap { x: 100, y: 200 })),
            node("end", NodeKind::End),
        ],
        vec![conn("start", "tap"), conn("tap", "end")],
    )
}

/// Store a scenario document so executor/dispatcher paths can load it.
pub(crate) fn put_scenario(store: &DocumentStore, scenario: &Scenario) {
    store
        .put(collections::SCENARIOS, scenario.id.as_str(), scenario)
        .unwrap();
}
