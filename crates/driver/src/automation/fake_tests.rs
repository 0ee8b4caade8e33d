// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_scenario::SelectorStrategy;

#[tokio::test]
async fn sessions_are_created_and_probed() {
    let driver = FakeDriver::new();
    let session = driver
        .create_session(&DeviceId::new("A"))
        .await
        .unwrap();
    assert_eq!(driver.window_size(&session).await.unwrap(), (1080, 2400));
    assert_eq!(driver.live_sessions(), 1);
}

#[tokio::test]
async fn rejected_devices_fail_creation() {
    let driver = FakeDriver::new();
    driver.reject_device("A");
    let err = driver.create_session(&DeviceId::new("A")).await.unwrap_err();
    assert!(matches!(err, DriverError::SessionRejected(_)));

    driver.accept_device("A");
    assert!(driver.create_session(&DeviceId::new("A")).await.is_ok());
}

#[tokio::test]
async fn killed_sessions_fail_probe() {
    let driver = FakeDriver::new();
    let session = driver.create_session(&DeviceId::new("A")).await.unwrap();
    driver.kill_session(&session);
    assert!(driver.window_size(&session).await.is_err());
}

#[tokio::test]
async fn elements_appear_and_disappear() {
    let driver = FakeDriver::new();
    let session = driver.create_session(&DeviceId::new("A")).await.unwrap();
    let selector = Selector::new(SelectorStrategy::Id, "btn");
    let rect = ElementRect {
        x: 0,
        y: 0,
        width: 100,
        height: 50,
    };

    assert!(driver.find_element(&session, &selector).await.unwrap().is_none());
    driver.show_element("A", &selector, rect);
    assert_eq!(
        driver.find_element(&session, &selector).await.unwrap(),
        Some(rect)
    );
    driver.hide_element("A", &selector);
    assert!(driver.find_element(&session, &selector).await.unwrap().is_none());
}

#[tokio::test]
async fn transient_faults_are_consumed_once() {
    let driver = FakeDriver::new();
    let session = driver.create_session(&DeviceId::new("A")).await.unwrap();
    driver.push_transient_fault("flake");

    let err = driver.tap(&session, 1, 1).await.unwrap_err();
    assert!(err.is_transient());
    assert!(driver.tap(&session, 1, 1).await.is_ok());
}

#[tokio::test]
async fn recording_lifecycle_yields_bytes_once() {
    let driver = FakeDriver::new();
    let session = driver.create_session(&DeviceId::new("A")).await.unwrap();

    // Not recording: empty
    assert!(driver.stop_recording(&session).await.unwrap().is_empty());

    driver
        .start_recording(&session, &RecordingOptions::default())
        .await
        .unwrap();
    assert_eq!(driver.stop_recording(&session).await.unwrap(), b"fake-mp4");
    assert!(driver.stop_recording(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn calls_are_recorded_in_order() {
    let driver = FakeDriver::new();
    let session = driver.create_session(&DeviceId::new("A")).await.unwrap();
    driver.tap(&session, 5, 6).await.unwrap();
    driver.launch_app(&session, "com.shop").await.unwrap();

    let calls = driver.calls();
    assert!(matches!(calls[0], DriverCall::CreateSession { .. }));
    assert!(matches!(calls[1], DriverCall::Tap { x: 5, y: 6, .. }));
    assert!(matches!(
        &calls[2],
        DriverCall::LaunchApp { package, .. } if package == "com.shop"
    ));
}
