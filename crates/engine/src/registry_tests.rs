// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::harness;
use dl_driver::DriverCall;

#[tokio::test]
async fn create_allocates_unique_ports_from_base() {
    let h = harness();
    let a = h.registry.create(&DeviceId::new("A")).await.unwrap();
    let b = h.registry.create(&DeviceId::new("B")).await.unwrap();
    let c = h.registry.create(&DeviceId::new("C")).await.unwrap();

    assert_eq!(a.mjpeg_port, MJPEG_PORT_BASE);
    assert_eq!(b.mjpeg_port, MJPEG_PORT_BASE + 1);
    assert_eq!(c.mjpeg_port, MJPEG_PORT_BASE + 2);
    assert_eq!(h.registry.live_count(), 3);
}

#[tokio::test]
async fn create_is_idempotent_for_healthy_sessions() {
    let h = harness();
    let first = h.registry.create(&DeviceId::new("A")).await.unwrap();
    let second = h.registry.create(&DeviceId::new("A")).await.unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(first.mjpeg_port, second.mjpeg_port);
    assert_eq!(h.registry.live_count(), 1);
    // Only one remote session was ever created
    let creates = h
        .driver
        .calls()
        .iter()
        .filter(|c| matches!(c, DriverCall::CreateSession { .. }))
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn dead_session_is_replaced_on_create() {
    let h = harness();
    let first = h.registry.create(&DeviceId::new("A")).await.unwrap();
    h.driver.kill_session(first.session_id.as_str());

    let second = h.registry.create(&DeviceId::new("A")).await.unwrap();
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(h.registry.live_count(), 1);
}

#[tokio::test]
async fn destroyed_port_is_reused_by_next_create() {
    let h = harness();
    let a = h.registry.create(&DeviceId::new("A")).await.unwrap();
    let _b = h.registry.create(&DeviceId::new("B")).await.unwrap();

    assert!(h.registry.destroy(&DeviceId::new("A")).await.unwrap());
    let c = h.registry.create(&DeviceId::new("C")).await.unwrap();
    assert_eq!(c.mjpeg_port, a.mjpeg_port);
}

#[tokio::test]
async fn destroy_unknown_reports_not_found() {
    let h = harness();
    assert!(!h.registry.destroy(&DeviceId::new("ghost")).await.unwrap());
}

#[tokio::test]
async fn destroy_all_clears_everything() {
    let h = harness();
    h.registry.create(&DeviceId::new("A")).await.unwrap();
    h.registry.create(&DeviceId::new("B")).await.unwrap();

    h.registry.destroy_all().await;
    assert_eq!(h.registry.live_count(), 0);
    assert!(h.registry.info(&DeviceId::new("A")).is_none());
}

#[tokio::test]
async fn check_health_evicts_dead_sessions() {
    let h = harness();
    let info = h.registry.create(&DeviceId::new("A")).await.unwrap();
    assert!(h.registry.check_health(&DeviceId::new("A")).await);

    h.driver.kill_session(info.session_id.as_str());
    assert!(!h.registry.check_health(&DeviceId::new("A")).await);
    // Eviction leaves a clean slate
    assert!(h.registry.info(&DeviceId::new("A")).is_none());
}

#[tokio::test]
async fn check_health_on_unknown_device_is_false() {
    let h = harness();
    assert!(!h.registry.check_health(&DeviceId::new("A")).await);
}

#[tokio::test]
async fn creation_failure_surfaces_to_caller() {
    let h = harness();
    h.driver.reject_device("A");
    let err = h.registry.create(&DeviceId::new("A")).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionCreationFailed { .. }));
    assert_eq!(h.registry.live_count(), 0);
}

#[tokio::test]
async fn validate_partitions_validated_recreated_failed() {
    let h = harness();
    let a = DeviceId::new("A");
    let b = DeviceId::new("B");
    let c = DeviceId::new("C");

    // A healthy, B dead, C rejected
    h.registry.create(&a).await.unwrap();
    let b_info = h.registry.create(&b).await.unwrap();
    h.driver.kill_session(b_info.session_id.as_str());
    h.driver.reject_device("C");

    let outcome = h
        .registry
        .validate_and_ensure(&[a.clone(), b.clone(), c.clone()])
        .await;
    assert_eq!(outcome.validated, vec![a.clone()]);
    assert_eq!(outcome.recreated, vec![b.clone()]);
    assert_eq!(outcome.failed, vec![c]);
    assert_eq!(outcome.usable(), vec![a, b]);
}

#[tokio::test]
async fn validate_creates_missing_sessions() {
    let h = harness();
    let outcome = h
        .registry
        .validate_and_ensure(&[DeviceId::new("A"), DeviceId::new("B")])
        .await;
    assert!(outcome.validated.is_empty());
    assert_eq!(outcome.recreated.len(), 2);
    assert_eq!(h.registry.live_count(), 2);
}

#[tokio::test]
async fn concurrent_ensure_never_double_creates() {
    let h = harness();
    let mut join_set = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let registry = Arc::clone(&h.registry);
        join_set.spawn(async move { registry.ensure_session(&DeviceId::new("A")).await });
    }
    let mut session_ids = Vec::new();
    while let Some(result) = join_set.join_next().await {
        session_ids.push(result.unwrap().unwrap().session_id);
    }
    session_ids.dedup();
    assert_eq!(session_ids.len(), 1, "all callers saw the same session");

    let creates = h
        .driver
        .calls()
        .iter()
        .filter(|c| matches!(c, DriverCall::CreateSession { .. }))
        .count();
    assert_eq!(creates, 1);
}
